use std::rc::Rc;

use nscript::{
    diagnostics::ErrorKind,
    runtime::{EvalConfig, Interpreter},
    value::{to_int, Value},
    Object,
};

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval(source)
        .expect("evaluation should succeed")
}

fn eval_kind(source: &str) -> ErrorKind {
    let mut interpreter = Interpreter::new();
    match interpreter.eval(source) {
        Ok(value) => panic!("expected error, received value {value:?}"),
        Err(err) => err.kind().expect("engine errors carry a kind"),
    }
}

fn expect_int(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        _ => panic!("expected Int, found {}", value.type_name()),
    }
}

fn expect_double(value: &Value) -> f64 {
    match value {
        Value::Double(d) => *d,
        _ => panic!("expected Double, found {}", value.type_name()),
    }
}

fn expect_str(value: &Value) -> &str {
    match value {
        Value::Str(s) => s,
        _ => panic!("expected String, found {}", value.type_name()),
    }
}

#[test]
fn integer_division_and_modulo() {
    // `/` truncates on two ints, `\` always divides as ints
    let value = eval(r"5/2 - 5\2 + 5%2");
    assert_eq!(expect_int(&value), 1);
}

#[test]
fn hex_literals() {
    assert_eq!(expect_int(&eval("0x1F")), 31);
}

#[test]
fn power_is_always_double() {
    let value = eval("2^10");
    assert_eq!(expect_double(&value), 1024.0);
}

#[test]
fn exponent_literals() {
    let value = eval("1.5e2");
    assert_eq!(expect_double(&value), 150.0);
    // signed exponents, combined with unary minus
    assert!((expect_double(&eval("-3.14e-1-1e+0")) + 1.314).abs() < 1e-9);
}

#[test]
fn long_fractions_drop_insignificant_digits() {
    let value = eval("3.14159265358979323846264338327950288");
    assert!((expect_double(&value) - std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn doubled_quotes_embed_delimiters() {
    assert_eq!(expect_str(&eval("'it''s'")), "it's");
    assert_eq!(expect_str(&eval(r#""say ""hi""" + '!'"#)), "say \"hi\"!");
}

#[test]
fn comparisons_use_variant_booleans() {
    assert_eq!(expect_int(&eval("1 < 2")), -1);
    assert_eq!(expect_int(&eval("1 > 2")), 0);
    assert_eq!(expect_int(&eval("!(1 < 2)")), 0);
    assert_eq!(expect_int(&eval("1 < 2 && 2 < 3")), -1);
}

#[test]
fn empty_sorts_after_everything() {
    assert_eq!(expect_int(&eval("5 < empty")), -1);
    assert_eq!(expect_int(&eval("empty == empty")), -1);
}

#[test]
fn arrays_compare_elementwise() {
    assert_eq!(expect_int(&eval("[1, 2, 3] == [1, 2, 3]")), -1);
    assert_eq!(expect_int(&eval("[1, 2] < [1, 3]")), -1);
    // a shared prefix makes the shorter array smaller
    assert_eq!(expect_int(&eval("[1, 2] < [1, 2, 3]")), -1);
}

#[test]
fn increment_and_decrement() {
    let value = eval("x = 1; y = x++; z = ++x; y - z + -x");
    assert_eq!(expect_int(&value), -5);
}

#[test]
fn bitwise_operators_with_hex_output() {
    let value = eval("upper(hex(0xAA & ~0x0F | 0x3))");
    assert_eq!(expect_str(&value), "A3");
}

#[test]
fn ternary_evaluates_only_the_taken_branch() {
    let taken = eval("x = 0; 1 ? (x = 1) : (x = 2); x");
    assert_eq!(expect_int(&taken), 1);
    let skipped = eval("y = 0; 0 ? (y = 1) : (y = 2); y");
    assert_eq!(expect_int(&skipped), 2);
}

#[test]
fn if_else_selects_branch() {
    assert_eq!(expect_str(&eval("if (1 < 2) 'a' else 'b'")), "a");
    assert_eq!(expect_str(&eval("if (1 > 2) 'a' else 'b'")), "b");
}

#[test]
fn if_conditions_do_not_need_parentheses() {
    assert_eq!(expect_str(&eval("if 1 < 2 'a' else 'b'")), "a");
    let value = eval("gcd = sub(a, b) if b == 0 a else gcd(b, a % b); gcd(54, 24)");
    assert_eq!(expect_int(&value), 6);
}

#[test]
fn for_loop_accumulates() {
    let value = eval("s = 0; for (i = 0; i < 5; i++) s = s + i; s");
    assert_eq!(expect_int(&value), 10);
}

#[test]
fn trailing_semicolons_keep_the_result() {
    assert_eq!(expect_int(&eval("x = 1;;;; x")), 1);
    assert_eq!(expect_int(&eval("42;")), 42);
}

#[test]
fn array_literals_and_indexing() {
    assert_eq!(expect_int(&eval("x = [1, 2, 3]; x[1]")), 2);
    assert_eq!(eval("[1, 2, 3]").to_string(), "[1; 2; 3]");
    // single element literals stay arrays
    assert_eq!(eval("x = [5]; str(x[0])").to_string(), "5");
}

#[test]
fn element_assignment_grows_the_array() {
    let value = eval("x = [1]; x[3] = 9; x");
    assert_eq!(value.to_string(), "[1; ; ; 9]");
}

#[test]
fn join_builds_and_flattens_lists() {
    assert_eq!(eval("1 : [2, 3]").to_string(), "[1; 2; 3]");
    assert_eq!(eval("[1, 2] : 3").to_string(), "[1; 2; 3]");
    assert_eq!(eval("empty : 7 : empty").to_string(), "7");
}

#[test]
fn head_and_tail() {
    assert_eq!(expect_int(&eval("`[7, 8, 9]")), 7);
    assert_eq!(eval("[7, 8, 9]`").to_string(), "[8; 9]");
    // scalars pass through head and have no tail
    assert_eq!(expect_int(&eval("`5")), 5);
    assert!(eval("x = 5; x`; ").to_string().is_empty());
}

#[test]
fn pipeline_calls_the_right_operand() {
    let value = eval("5 | sub(x) x * 7");
    assert_eq!(expect_int(&value), 35);
}

#[test]
fn closures_share_captured_cells() {
    let value = eval("x = 1; f = sub() x; x = 2; f()");
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn nested_closures_capture_parameters() {
    let value = eval("makeadd = sub(n) sub(x) x + n; add3 = makeadd(3); add3(4)");
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn my_declares_a_shadowing_local() {
    let value = eval("x = 1; f = sub() { my x; x = 5; x }; f() + x");
    assert_eq!(expect_int(&value), 6);
}

#[test]
fn functions_recurse_through_their_own_name() {
    let value = eval("fact = sub(n) n ? n * fact(n - 1) : 1; fact(5)");
    assert_eq!(expect_int(&value), 120);
}

#[test]
fn quicksort_composes_recursion_filters_and_joins() {
    let value = eval(
        "qsort = sub(a) size(a) \
           ? (qsort(filter(sub(x) x < `a)(a`)) : `a : qsort(filter(sub(x) x >= `a)(a`))) \
           : [];\
         qsort([3, 1, 4, 1, 5, 9, 2, 6])",
    );
    assert_eq!(value.to_string(), "[1; 1; 2; 3; 4; 5; 6; 9]");
}

#[test]
fn variadic_functions_receive_params_as_at() {
    let value = eval("count = sub size(@); count(1, 2, 3)");
    assert_eq!(expect_int(&value), 3);
}

#[test]
fn fold_map_and_filter_combinators() {
    assert_eq!(
        expect_int(&eval("fold(sub(a, b) a + b)(1, 2, 3, 4, 5)")),
        15
    );
    assert_eq!(
        expect_int(&eval("fold(sub(a, b) a + b)(map(sub(x) x * x)(1, 2, 3, 4))")),
        30
    );
    assert_eq!(
        eval("filter(sub(x) x % 2)(1, 2, 3, 4, 5)").to_string(),
        "[1; 3; 5]"
    );
    assert_eq!(expect_int(&eval("(1, 2, 3, 4, 5) | fold(sub(a, b) a + b)")), 15);
}

#[test]
fn composition_applies_right_to_left() {
    let value = eval("double = sub(x) x * 2; inc = sub(x) x + 1; (double\u{b7}inc)(5)");
    assert_eq!(expect_int(&value), 12);
}

#[test]
fn assoc_arrays_vivify_and_print() {
    let value = eval("h = new hash; h['a'] = 1; h.b = 2; h['a'] + h.b");
    assert_eq!(expect_int(&value), 3);
    assert_eq!(
        eval("h = new hash; h.x = 1; h.y = 2; h").to_string(),
        "[x => 1; y => 2]"
    );
}

#[test]
fn classes_instantiate_with_constructor_parameters() {
    let value = eval(
        "point = object(x, y) { getx = sub() x; gety = sub() y };\
         p = new point(3, 7); p.getx() + p.gety()",
    );
    assert_eq!(expect_int(&value), 10);
}

#[test]
fn object_bodies_do_not_require_braces() {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval("c = object v = 42")
        .expect("unbraced object body parses");
    let value = interpreter.eval("(new c).v").expect("member resolves");
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn instances_keep_mutable_state() {
    let value = eval(
        "counter = object { n = 0; bump = sub() n += 1 };\
         c = new counter; c.bump(); c.bump(); c.n",
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn string_builtins() {
    assert_eq!(expect_int(&eval("len('h\u{e9}llo')")), 5);
    assert_eq!(expect_str(&eval("left('hello', 2)")), "he");
    assert_eq!(expect_str(&eval("right('hello', 2)")), "lo");
    assert_eq!(expect_str(&eval("mid('hello', 1, 3)")), "ell");
    assert_eq!(expect_int(&eval("instr('hello', 'll')")), 2);
    assert_eq!(expect_int(&eval("instr('hello', 'z')")), -1);
    assert_eq!(expect_str(&eval("string(3, 'ab')")), "aaa");
    assert_eq!(expect_str(&eval("replace('aaa', 'a', 'b')")), "bbb");
    assert_eq!(expect_str(&eval("chr(asc('A') + 1)")), "B");
}

#[test]
fn bool_converts_to_variant_booleans() {
    assert_eq!(expect_int(&eval("bool(2.5)")), -1);
    assert_eq!(expect_int(&eval("bool('') || bool(0)")), 0);
}

#[test]
fn numeric_builtins() {
    assert_eq!(expect_int(&eval("int(pi()) + int('2.9')")), 6);
    assert_eq!(expect_int(&eval("abs(-3)")), 3);
    assert_eq!(expect_int(&eval("sgn(-12.5)")), -1);
    assert!((expect_double(&eval("sqrt(49)")) - 7.0).abs() < 1e-12);
    assert!((expect_double(&eval("sqr(1.5)")) - 2.25).abs() < 1e-12);
    assert!(expect_double(&eval("rnd()")) < 1.0);
}

#[test]
fn array_builtins_mutate_in_place() {
    assert_eq!(expect_int(&eval("a = [1, 2]; add(a, 3); size(a)")), 3);
    assert_eq!(expect_int(&eval("a = [1, 2, 3]; remove(a, 0); a[0]")), 2);
    assert_eq!(expect_int(&eval("min(3, 1, 2)")), 1);
    assert_eq!(expect_int(&eval("max([3, 1, 2])")), 3);
}

#[test]
fn date_literals_and_accessors() {
    assert_eq!(expect_int(&eval("dayofweek(#23.08.2013#)")), 5);
    assert_eq!(expect_int(&eval("dayofyear(#23.08.2013#)")), 235);
    assert_eq!(expect_int(&eval("year(#1.2.03#)")), 2003);
    assert_eq!(expect_int(&eval("year(#1.2.74#)")), 1974);
    assert_eq!(expect_int(&eval("hour(#10:30#)")), 10);
    assert_eq!(
        eval("#23.08.2013 10:30:05#").to_string(),
        "23.08.2013 10:30:05"
    );
    assert_eq!(eval("#23.08.2013#").to_string(), "23.08.2013");
}

#[test]
fn unknown_names_read_as_empty() {
    assert!(eval("nonesuch").is_empty());
}

#[test]
fn unbalanced_pairs_are_missing_characters() {
    assert_eq!(eval_kind("(1, 2"), ErrorKind::MissingCharacter);
    assert_eq!(eval_kind("{ c = 1"), ErrorKind::MissingCharacter);
    assert_eq!(eval_kind("[1, 2"), ErrorKind::MissingCharacter);
    assert_eq!(eval_kind("'abc"), ErrorKind::MissingCharacter);
}

#[test]
fn malformed_definitions_are_syntax_errors() {
    assert_eq!(eval_kind("object(x) {"), ErrorKind::SyntaxError);
    assert_eq!(eval_kind("1 )"), ErrorKind::SyntaxError);
    assert_eq!(eval_kind("#99.99.2013#"), ErrorKind::SyntaxError);
    assert_eq!(eval_kind("1e"), ErrorKind::SyntaxError);
}

#[test]
fn calling_a_plain_instance_is_unsupported() {
    assert_eq!(eval_kind("(new object {})(0)"), ErrorKind::OperationNotSupported);
}

#[test]
fn parameter_counts_are_checked() {
    assert_eq!(
        eval_kind("new (object(x, y) {})()"),
        ErrorKind::BadParamCount
    );
    assert_eq!(eval_kind("sin(1, 2)"), ErrorKind::BadParamCount);
}

#[test]
fn oversized_literals_are_rejected() {
    assert_eq!(eval_kind("0x1ffffffffffffffff"), ErrorKind::ValueTooLarge);
}

#[test]
fn reading_past_the_end_is_a_runtime_error() {
    assert_eq!(eval_kind("x = 1;;;; x[5]"), ErrorKind::RuntimeError);
}

#[test]
fn assigning_to_a_constant_needs_an_lvalue() {
    assert_eq!(eval_kind("5 = 3"), ErrorKind::MissingLval);
}

#[test]
fn conversion_failures_are_type_mismatches() {
    assert_eq!(eval_kind("int('abc')"), ErrorKind::TypeMismatch);
    assert_eq!(eval_kind("'abc' * 2"), ErrorKind::OperationNotSupported);
}

#[test]
fn diagnostics_carry_position_and_source() {
    let mut interpreter = Interpreter::new();
    let source = "1 + $";
    let err = interpreter.eval(source).expect_err("lexing should fail");
    match err {
        nscript::NScriptError::Diagnostic(diag) => {
            assert_eq!(diag.content.as_deref(), Some(source));
            assert_eq!(diag.offset(), Some(4));
        }
        other => panic!("expected diagnostic, found {other}"),
    }
}

#[test]
fn loop_budget_stops_runaway_scripts() {
    let mut interpreter = Interpreter::with_config(EvalConfig {
        loop_limit: Some(1000),
        ..EvalConfig::default()
    });
    let err = interpreter.eval("for (; 1;) 1").expect_err("loop should trip");
    assert_eq!(err.kind(), Some(ErrorKind::TooManyIterations));
}

#[test]
fn host_bindings_are_visible_and_assignable() {
    let mut interpreter = Interpreter::new();
    interpreter.bind("answer", Value::Int(41));
    let value = interpreter.eval("answer + 1").expect("binding resolves");
    assert_eq!(expect_int(&value), 42);
    interpreter.eval("answer = 7").expect("binding accepts writes");
    let value = interpreter.eval("answer").expect("binding persists");
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn host_objects_participate_in_calls() {
    struct Doubler;

    impl Object for Doubler {
        fn get(self: Rc<Self>) -> nscript::diagnostics::Result<Value> {
            Ok(Value::Object(self))
        }

        fn call(self: Rc<Self>, params: Value) -> nscript::diagnostics::Result<Value> {
            Ok(Value::Int(to_int(&params)? * 2))
        }
    }

    let mut interpreter = Interpreter::new();
    interpreter.bind("twice", Value::object(Doubler));
    let value = interpreter.eval("twice(21)").expect("host call works");
    assert_eq!(expect_int(&value), 42);
}
