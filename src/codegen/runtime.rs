//! The fixed C runtime header (§4.6), assembled as a single string constant the way the
//! teacher's `compiler::mod::prelude()` hand-assembles its asm prelude section by section.
pub const PRELUDE: &str = r#"/* generated by ergo -- do not edit */
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <stdbool.h>
#include <stdint.h>
#include <stdarg.h>

typedef enum {
    ERGO_NULL,
    ERGO_INT,
    ERGO_FLOAT,
    ERGO_BOOL,
    ERGO_STR,
    ERGO_ARR,
    ERGO_OBJ,
    ERGO_FN,
} ErgoTag;

typedef struct ErgoVal {
    ErgoTag tag;
    union {
        int64_t i;
        double f;
        bool b;
        void *p;
    } as;
} ErgoVal;

typedef struct ErgoRc { uint64_t refcount; } ErgoRc;

typedef struct ErgoStr {
    ErgoRc rc;
    size_t len;
    char data[];
} ErgoStr;

typedef struct ErgoArr {
    ErgoRc rc;
    size_t len;
    size_t cap;
    ErgoVal *items;
} ErgoArr;

typedef struct ErgoObj {
    ErgoRc rc;
    const char *class_name;
    void (*drop)(struct ErgoObj *);
} ErgoObj;

typedef ErgoVal (*ErgoFnPtr)(void *env, int argc, ErgoVal *argv);

typedef struct ErgoFn {
    ErgoRc rc;
    ErgoFnPtr call;
    int arity;
    void *env;
} ErgoFn;

static void ergo_trap(const char *msg) {
    fprintf(stderr, "ergo trap: %s\n", msg);
    abort();
}

static ErgoVal ergo_null(void) {
    ErgoVal v;
    v.tag = ERGO_NULL;
    v.as.p = NULL;
    return v;
}

static ErgoVal ergo_int(int64_t i) {
    ErgoVal v;
    v.tag = ERGO_INT;
    v.as.i = i;
    return v;
}

static ErgoVal ergo_float(double f) {
    ErgoVal v;
    v.tag = ERGO_FLOAT;
    v.as.f = f;
    return v;
}

static ErgoVal ergo_bool(bool b) {
    ErgoVal v;
    v.tag = ERGO_BOOL;
    v.as.b = b;
    return v;
}

static ErgoVal ergo_str_new(const char *data, size_t len) {
    ErgoStr *s = malloc(sizeof(ErgoStr) + len + 1);
    if (!s) ergo_trap("allocation failure");
    s->rc.refcount = 1;
    s->len = len;
    memcpy(s->data, data, len);
    s->data[len] = '\0';
    ErgoVal v;
    v.tag = ERGO_STR;
    v.as.p = s;
    return v;
}

static ErgoVal ergo_str_from_cstr(const char *data) {
    return ergo_str_new(data, strlen(data));
}

static ErgoVal ergo_arr_new(void) {
    ErgoArr *a = malloc(sizeof(ErgoArr));
    if (!a) ergo_trap("allocation failure");
    a->rc.refcount = 1;
    a->len = 0;
    a->cap = 0;
    a->items = NULL;
    ErgoVal v;
    v.tag = ERGO_ARR;
    v.as.p = a;
    return v;
}

/* retain/release: primitives are no-ops, reference types bump/drop the shared header */
static ErgoVal ergo_retain(ErgoVal v) {
    switch (v.tag) {
        case ERGO_STR:
        case ERGO_ARR:
        case ERGO_OBJ:
        case ERGO_FN:
            if (v.as.p) ((ErgoRc *)v.as.p)->refcount++;
            break;
        default:
            break;
    }
    return v;
}

static void ergo_release(ErgoVal v) {
    switch (v.tag) {
        case ERGO_STR:
        case ERGO_ARR:
        case ERGO_OBJ:
        case ERGO_FN:
            break;
        default:
            return;
    }
    if (!v.as.p) return;
    ErgoRc *rc = (ErgoRc *)v.as.p;
    if (--rc->refcount > 0) return;

    switch (v.tag) {
        case ERGO_STR:
            free(v.as.p);
            break;
        case ERGO_ARR: {
            ErgoArr *a = (ErgoArr *)v.as.p;
            for (size_t i = 0; i < a->len; i++) ergo_release(a->items[i]);
            free(a->items);
            free(a);
            break;
        }
        case ERGO_OBJ: {
            ErgoObj *o = (ErgoObj *)v.as.p;
            if (o->drop) o->drop(o);
            free(o);
            break;
        }
        case ERGO_FN:
            free(v.as.p);
            break;
        default:
            break;
    }
}

/* moving a value into a slot: release the prior occupant, take `v` without retaining */
static void ergo_move_into(ErgoVal *slot, ErgoVal v) {
    ergo_release(*slot);
    *slot = v;
}

/* extracting a slot's value and nulling it out, with no retain/release */
static ErgoVal ergo_move(ErgoVal *slot) {
    ErgoVal v = *slot;
    slot->tag = ERGO_NULL;
    slot->as.p = NULL;
    return v;
}

static void ergo_arr_grow(ErgoArr *a, size_t min_cap) {
    if (a->cap >= min_cap) return;
    size_t new_cap = a->cap == 0 ? 4 : a->cap * 2;
    if (new_cap < min_cap) new_cap = min_cap;
    ErgoVal *items = realloc(a->items, new_cap * sizeof(ErgoVal));
    if (!items) ergo_trap("allocation failure");
    a->items = items;
    a->cap = new_cap;
}

/* array.add(x): moves `x` into the array without releasing it */
static void ergo_arr_add(ErgoVal arr, ErgoVal x) {
    ErgoArr *a = (ErgoArr *)arr.as.p;
    ergo_arr_grow(a, a->len + 1);
    a->items[a->len++] = x;
}

/* array[i]: retains the element being read */
static ErgoVal ergo_arr_get(ErgoVal arr, int64_t i) {
    ErgoArr *a = (ErgoArr *)arr.as.p;
    if (i < 0 || (size_t)i >= a->len) ergo_trap("array index out of range");
    return ergo_retain(a->items[i]);
}

static void ergo_arr_set(ErgoVal arr, int64_t i, ErgoVal v) {
    ErgoArr *a = (ErgoArr *)arr.as.p;
    if (i < 0 || (size_t)i >= a->len) ergo_trap("array index out of range");
    ergo_move_into(&a->items[i], v);
}

/* array.remove(i): transfers ownership of the removed element to the caller */
static ErgoVal ergo_arr_remove(ErgoVal arr, int64_t i) {
    ErgoArr *a = (ErgoArr *)arr.as.p;
    if (i < 0 || (size_t)i >= a->len) ergo_trap("array index out of range");
    ErgoVal out = a->items[i];
    for (size_t j = (size_t)i; j + 1 < a->len; j++) a->items[j] = a->items[j + 1];
    a->len--;
    return out;
}

static int64_t ergo_arr_len(ErgoVal arr) {
    return (int64_t)((ErgoArr *)arr.as.p)->len;
}

static int64_t ergo_len(ErgoVal v) {
    if (v.tag == ERGO_ARR) return ergo_arr_len(v);
    if (v.tag == ERGO_STR) return (int64_t)((ErgoStr *)v.as.p)->len;
    ergo_trap("len() requires an array or string");
    return 0;
}

static bool ergo_is_null(ErgoVal v) {
    return v.tag == ERGO_NULL;
}

static ErgoVal ergo_str_concat(ErgoVal a, ErgoVal b) {
    ErgoStr *sa = (ErgoStr *)a.as.p;
    ErgoStr *sb = (ErgoStr *)b.as.p;
    size_t len = sa->len + sb->len;
    ErgoStr *out = malloc(sizeof(ErgoStr) + len + 1);
    if (!out) ergo_trap("allocation failure");
    out->rc.refcount = 1;
    out->len = len;
    memcpy(out->data, sa->data, sa->len);
    memcpy(out->data + sa->len, sb->data, sb->len);
    out->data[len] = '\0';
    ErgoVal v;
    v.tag = ERGO_STR;
    v.as.p = out;
    return v;
}

/* string indexing/foreach: allocates a new one-character string */
static ErgoVal ergo_str_at(ErgoVal s, int64_t i) {
    ErgoStr *str = (ErgoStr *)s.as.p;
    if (i < 0 || (size_t)i >= str->len) ergo_trap("string index out of range");
    return ergo_str_new(str->data + i, 1);
}

static ErgoVal ergo_num_to_string(ErgoVal v) {
    char buf[64];
    int n;
    if (v.tag == ERGO_INT) {
        n = snprintf(buf, sizeof(buf), "%lld", (long long)v.as.i);
    } else if (v.tag == ERGO_FLOAT) {
        n = snprintf(buf, sizeof(buf), "%g", v.as.f);
    } else {
        ergo_trap("to_string() requires a numeric value");
        return ergo_null();
    }
    return ergo_str_new(buf, (size_t)n);
}

static ErgoVal ergo_bool_to_string(ErgoVal v) {
    return ergo_str_from_cstr(v.as.b ? "true" : "false");
}

/* generic stringification used by write()/writef()'s `{}` substitution and the `str()` builtin */
static ErgoVal ergo_str(ErgoVal v) {
    switch (v.tag) {
        case ERGO_NULL:
            return ergo_str_from_cstr("null");
        case ERGO_INT:
        case ERGO_FLOAT:
            return ergo_num_to_string(v);
        case ERGO_BOOL:
            return ergo_bool_to_string(v);
        case ERGO_STR:
            return ergo_retain(v);
        default:
            ergo_trap("str() requires a primitive value");
            return ergo_null();
    }
}

/* `+` additionally accepts a string on either side, stringifying the other operand */
static ErgoVal ergo_add(ErgoVal a, ErgoVal b) {
    if (a.tag == ERGO_STR || b.tag == ERGO_STR) {
        ErgoVal sa = ergo_str(a);
        ErgoVal sb = ergo_str(b);
        ErgoVal out = ergo_str_concat(sa, sb);
        ergo_release(sa);
        ergo_release(sb);
        return out;
    }
    if (a.tag == ERGO_INT && b.tag == ERGO_INT) return ergo_int(a.as.i + b.as.i);
    double af = a.tag == ERGO_INT ? (double)a.as.i : a.as.f;
    double bf = b.tag == ERGO_INT ? (double)b.as.i : b.as.f;
    return ergo_float(af + bf);
}

static ErgoVal ergo_sub(ErgoVal a, ErgoVal b) {
    if (a.tag == ERGO_INT && b.tag == ERGO_INT) return ergo_int(a.as.i - b.as.i);
    double af = a.tag == ERGO_INT ? (double)a.as.i : a.as.f;
    double bf = b.tag == ERGO_INT ? (double)b.as.i : b.as.f;
    return ergo_float(af - bf);
}

static ErgoVal ergo_mul(ErgoVal a, ErgoVal b) {
    if (a.tag == ERGO_INT && b.tag == ERGO_INT) return ergo_int(a.as.i * b.as.i);
    double af = a.tag == ERGO_INT ? (double)a.as.i : a.as.f;
    double bf = b.tag == ERGO_INT ? (double)b.as.i : b.as.f;
    return ergo_float(af * bf);
}

/* `/` always promotes to float, matching spec.md's open question on num's runtime split */
static ErgoVal ergo_div(ErgoVal a, ErgoVal b) {
    double af = a.tag == ERGO_INT ? (double)a.as.i : a.as.f;
    double bf = b.tag == ERGO_INT ? (double)b.as.i : b.as.f;
    return ergo_float(af / bf);
}

static ErgoVal ergo_mod(ErgoVal a, ErgoVal b) {
    if (a.tag == ERGO_INT && b.tag == ERGO_INT) return ergo_int(a.as.i % b.as.i);
    ergo_trap("'%' on a float");
    return ergo_null();
}

static ErgoVal ergo_neg(ErgoVal a) {
    if (a.tag == ERGO_INT) return ergo_int(-a.as.i);
    return ergo_float(-a.as.f);
}

static double ergo_as_num(ErgoVal v) {
    if (v.tag == ERGO_INT) return (double)v.as.i;
    if (v.tag == ERGO_FLOAT) return v.as.f;
    ergo_trap("type mismatch in as_float");
    return 0.0;
}

static bool ergo_eq(ErgoVal a, ErgoVal b) {
    if (a.tag != b.tag) return false;
    switch (a.tag) {
        case ERGO_NULL:
            return true;
        case ERGO_INT:
            return a.as.i == b.as.i;
        case ERGO_FLOAT:
            return a.as.f == b.as.f;
        case ERGO_BOOL:
            return a.as.b == b.as.b;
        case ERGO_STR: {
            ErgoStr *sa = (ErgoStr *)a.as.p;
            ErgoStr *sb = (ErgoStr *)b.as.p;
            return sa->len == sb->len && memcmp(sa->data, sb->data, sa->len) == 0;
        }
        default:
            return a.as.p == b.as.p;
    }
}

static void ergo_write(ErgoVal v) {
    ErgoVal s = ergo_str(v);
    fwrite(((ErgoStr *)s.as.p)->data, 1, ((ErgoStr *)s.as.p)->len, stdout);
    ergo_release(s);
}

/* writef(fmt, tuple): walks `fmt`, replacing each "{}" with the next tuple element's str() form */
static void ergo_writef(ErgoVal fmt, ErgoVal tuple_items[], int tuple_len) {
    ErgoStr *f = (ErgoStr *)fmt.as.p;
    int arg = 0;
    for (size_t i = 0; i < f->len; i++) {
        if (f->data[i] == '{' && i + 1 < f->len && f->data[i + 1] == '}') {
            if (arg >= tuple_len) ergo_trap("writef() format references more values than supplied");
            ErgoVal s = ergo_str(tuple_items[arg++]);
            fwrite(((ErgoStr *)s.as.p)->data, 1, ((ErgoStr *)s.as.p)->len, stdout);
            ergo_release(s);
            i++;
        } else {
            fputc(f->data[i], stdout);
        }
    }
}

static ErgoVal ergo_call_fn(ErgoVal fn, int argc, ErgoVal *argv) {
    ErgoFn *f = (ErgoFn *)fn.as.p;
    if (f->arity != argc) ergo_trap("arity mismatch on dynamic call");
    return f->call(f->env, argc, argv);
}

/* Wraps a generated lambda's C function pointer into a heap-allocated ErgoVal of tag FN. */
static ErgoVal ergo_fn_new(ErgoFnPtr call, int arity) {
    ErgoFn *f = malloc(sizeof(ErgoFn));
    f->rc.refcount = 1;
    f->call = call;
    f->arity = arity;
    f->env = NULL;
    ErgoVal v = { .tag = ERGO_FN, .as = { .p = f } };
    return v;
}

static ErgoVal ergo_parse_hinted(const char *slice, size_t len, ErgoVal hint) {
    while (len > 0 && (slice[0] == ' ' || slice[0] == '\t')) { slice++; len--; }
    while (len > 0 && (slice[len - 1] == ' ' || slice[len - 1] == '\t')) len--;
    char buf[256];
    size_t n = len < sizeof(buf) - 1 ? len : sizeof(buf) - 1;
    memcpy(buf, slice, n);
    buf[n] = '\0';
    switch (hint.tag) {
        case ERGO_INT:
            return ergo_int(strtoll(buf, NULL, 10));
        case ERGO_FLOAT:
            return ergo_float(strtod(buf, NULL));
        case ERGO_BOOL:
            return ergo_bool(strcmp(buf, "true") == 0);
        default:
            return ergo_str_new(buf, n);
    }
}

/* readf(fmt, line, hints): splits the already-read `line` on `fmt`'s literal segments and
 * parses each captured slice according to the tag of the corresponding hint value */
static ErgoVal ergo_readf(ErgoVal fmt, ErgoVal line_val, ErgoVal hints[], int hints_len) {
    ErgoStr *ls = (ErgoStr *)line_val.as.p;
    const char *line = ls->data;
    size_t line_len = ls->len;
    while (line_len > 0 && (line[line_len - 1] == '\n' || line[line_len - 1] == '\r')) line_len--;

    ErgoStr *f = (ErgoStr *)fmt.as.p;
    ErgoVal out = ergo_arr_new();
    size_t li = 0, fi = 0;
    int hint_idx = 0;
    while (fi < f->len) {
        if (f->data[fi] == '{' && fi + 1 < f->len && f->data[fi + 1] == '}') {
            fi += 2;
            size_t start = li;
            size_t stop_at = fi < f->len ? f->data[fi] : 0;
            while (li < line_len && (stop_at == 0 || line[li] != (char)stop_at)) li++;
            ErgoVal hint = hint_idx < hints_len ? hints[hint_idx++] : ergo_str_from_cstr("");
            ergo_arr_add(out, ergo_parse_hinted(line + start, li - start, hint));
        } else {
            if (li < line_len && line[li] == f->data[fi]) li++;
            fi++;
        }
    }
    return out;
}
"#;
