mod common;

use common::{run, run_ok};
use treelox::lox::ExitStatus;

fn runtime_error(source: &str) -> (String, String) {
    let outcome = run(source);
    assert_eq!(outcome.status, ExitStatus::Software, "source: {}", source);
    (outcome.out, outcome.err)
}

#[test]
fn test_truthiness_and_equality() {
    assert_eq!(
        run_ok(
            "print 0 == false;\n\
             print !nil;\n\
             print !0;\n\
             print \"a\" == \"a\";\n\
             print nil == nil;\n\
             print nil == false;\n\
             print 1 != 2;\n\
             print !\"\";"
        ),
        "false\ntrue\nfalse\ntrue\ntrue\nfalse\ntrue\nfalse\n"
    );
}

#[test]
fn test_numeric_semantics() {
    assert_eq!(
        run_ok("print 10 / 3; print \"hi \" + 2; print 2 + \"hi\"; print 1.0; print -0.5 * 4;"),
        "3.3333333333333335\nhi 2\n2hi\n1\n-2\n"
    );
    assert_eq!(run_ok("print 3 > 2; print 2 <= 1; print 1 + 2 * 3;"), "true\nfalse\n7\n");
    assert_eq!(run_ok("print \"con\" + \"cat\"; print \"n: \" + nil;"), "concat\nn: nil\n");
}

#[test]
fn test_division_by_zero_is_a_runtime_error() {
    let (out, err) = runtime_error("print 1;\nprint 10 / 0;\nprint 2;");

    assert_eq!(out, "1\n");
    assert_eq!(err, "Division by zero\n[line 2]\n");
}

#[test]
fn test_operand_type_errors() {
    assert_eq!(
        runtime_error("print -\"x\";").1,
        "Operand must be a number.\n[line 1]\n"
    );
    assert_eq!(
        runtime_error("print 1 < \"2\";").1,
        "Operands must be numbers.\n[line 1]\n"
    );
    assert_eq!(
        runtime_error("print true + 1;").1,
        "Operands must be two numbers or at least one string.\n[line 1]\n"
    );
}

#[test]
fn test_logical_operators_return_deciding_operand() {
    assert_eq!(
        run_ok(
            "print nil or \"yes\";\n\
             print 0 or \"no\";\n\
             print false and explode();\n\
             print 1 and 2;"
        ),
        "yes\n0\nfalse\n2\n"
    );
}

#[test]
fn test_ternary() {
    assert_eq!(
        run_ok("print true ? 1 : 2; print nil ? 1 : false ? 2 : 3;"),
        "1\n3\n"
    );
}

#[test]
fn test_lexical_scoping_captures_definition_site() {
    assert_eq!(
        run_ok(
            "var a = \"outer\";\n\
             fun f() { print a; }\n\
             {\n\
               var a = \"inner\";\n\
               f();\n\
             }"
        ),
        "outer\n"
    );
}

#[test]
fn test_block_shadowing_and_assignment() {
    assert_eq!(
        run_ok(
            "var a = 1;\n\
             {\n\
               var a = 2;\n\
               { a = 3; print a; }\n\
               print a;\n\
             }\n\
             print a;"
        ),
        "3\n3\n1\n"
    );
}

#[test]
fn test_for_loop_desugaring() {
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );

    let (out, err) = runtime_error("for (var i = 0; i < 1; i = i + 1) {}\nprint i;");
    assert_eq!(out, "");
    assert_eq!(err, "Undefined variable 'i'.\n[line 2]\n");
}

#[test]
fn test_break_exits_innermost_loop_only() {
    assert_eq!(run_ok("while (true) { print \"x\"; break; }"), "x\n");

    assert_eq!(
        run_ok(
            "for (var i = 0; i < 3; i = i + 1) {\n\
               for (var j = 0; j < 10; j = j + 1) {\n\
                 if (j == 1) break;\n\
                 print i + j;\n\
               }\n\
             }"
        ),
        "0\n1\n2\n"
    );
}

#[test]
fn test_break_outside_loop_is_a_runtime_error() {
    assert_eq!(
        runtime_error("print 1;\nbreak;").1,
        "Break occurred outside loop.\n[line 2]\n"
    );

    // A call starts a fresh frame: the caller's loop is not visible.
    let (out, err) = runtime_error(
        "fun f() { break; }\n\
         while (true) { print \"in\"; f(); }",
    );
    assert_eq!(out, "in\n");
    assert_eq!(err, "Break occurred outside loop.\n[line 1]\n");
}

#[test]
fn test_return_unwinds_loops_inside_functions() {
    assert_eq!(
        run_ok(
            "fun find() {\n\
               var i = 0;\n\
               while (true) {\n\
                 if (i == 4) return i;\n\
                 i = i + 1;\n\
               }\n\
             }\n\
             print find();\n\
             fun nothing() {}\n\
             print nothing();"
        ),
        "4\nnil\n"
    );
}

#[test]
fn test_use_before_assign() {
    // Declared but unassigned cells cannot be read.
    let (out, err) = runtime_error("var a;\nprint a;");
    assert_eq!(out, "");
    assert_eq!(err, "Variable not yet initialized 'a'.\n[line 2]\n");

    // Resolution accepts these; assignment makes the cell readable.
    assert_eq!(run_ok("var a; { var b; b = 2; a = b; } print a;"), "2\n");
    assert_eq!(run_ok("{ var a; var b = 1; a = b; print a; }"), "1\n");
    assert_eq!(run_ok("var a = nil; print a;"), "nil\n");
}

#[test]
fn test_undefined_variables() {
    assert_eq!(
        runtime_error("print nope;").1,
        "Undefined variable 'nope'.\n[line 1]\n"
    );
    assert_eq!(
        runtime_error("nope = 1;").1,
        "Undefined variable 'nope'.\n[line 1]\n"
    );
}

#[test]
fn test_recursive_fibonacci() {
    let out = run_ok(
        "fun fib(n) {\n\
           if (n <= 1) return n;\n\
           return fib(n - 2) + fib(n - 1);\n\
         }\n\
         for (var i = 0; i < 20; i = i + 1) print fib(i);",
    );

    let expected: Vec<String> = {
        let (mut a, mut b) = (0u64, 1u64);
        (0..20)
            .map(|_| {
                let current = a;
                (a, b) = (b, a + b);
                current.to_string()
            })
            .collect()
    };

    assert_eq!(out.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn test_closures_keep_their_own_state() {
    assert_eq!(
        run_ok(
            "fun makeCounter() {\n\
               var count = 0;\n\
               fun inc() { count = count + 1; return count; }\n\
               return inc;\n\
             }\n\
             var a = makeCounter();\n\
             var b = makeCounter();\n\
             a(); a();\n\
             print a();\n\
             print b();"
        ),
        "3\n1\n"
    );
}

#[test]
fn test_call_errors() {
    assert_eq!(
        runtime_error("\"str\"();").1,
        "Can only call functions and classes.\n[line 1]\n"
    );
    assert_eq!(
        runtime_error("fun f(a, b) {}\nf(1);").1,
        "Expected 2 arguments but got 1.\n[line 2]\n"
    );
    assert_eq!(
        runtime_error("class C { init(x) {} }\nC();").1,
        "Expected 1 arguments but got 0.\n[line 2]\n"
    );
}

#[test]
fn test_classes_and_methods() {
    assert_eq!(
        run_ok(
            "class C {\n\
               init(x) { this.x = x; }\n\
               g() { return this.x + 1; }\n\
             }\n\
             print C(41).g();\n\
             print C(1);\n\
             print C;"
        ),
        "42\n<instance C>\n<class C>\n"
    );
}

#[test]
fn test_bound_methods_remember_their_instance() {
    assert_eq!(
        run_ok(
            "class Person {\n\
               init(name) { this.name = name; }\n\
               greet() { print \"hi \" + this.name; }\n\
             }\n\
             var m = Person(\"ann\").greet;\n\
             m();\n\
             var p = Person(\"bob\");\n\
             p.greet = \"shadowed\";\n\
             print p.greet;"
        ),
        "hi ann\nshadowed\n"
    );
}

#[test]
fn test_initializer_always_returns_instance() {
    assert_eq!(
        run_ok(
            "class C {\n\
               init() { this.n = 1; return; }\n\
             }\n\
             var c = C();\n\
             c.n = 5;\n\
             var again = c.init();\n\
             print again;\n\
             print again == c;\n\
             print c.n;"
        ),
        "<instance C>\ntrue\n1\n"
    );
}

#[test]
fn test_property_errors() {
    assert_eq!(
        runtime_error("class C {}\nprint C().missing;").1,
        "Undefined property 'missing'.\n[line 2]\n"
    );
    assert_eq!(
        runtime_error("var x = 1;\nprint x.y;").1,
        "Only instances have properties.\n[line 2]\n"
    );
    assert_eq!(
        runtime_error("var x = 1;\nx.y = 2;").1,
        "Only instances have fields.\n[line 2]\n"
    );
}

#[test]
fn test_stringification_of_callables() {
    assert_eq!(
        run_ok("fun f() {} print f; print clock; class K { m() {} } print K().m;"),
        "<fn f>\n<native fn>\n<fn m>\n"
    );
}

#[test]
fn test_clock_returns_seconds() {
    assert_eq!(
        run_ok("var t = clock(); print t > 1000000000; print clock() >= t;"),
        "true\ntrue\n"
    );
}

#[test]
fn test_static_error_skips_evaluation() {
    let outcome = run("print \"before\";\nprint ;");

    assert_eq!(outcome.status, ExitStatus::DataError);
    assert_eq!(outcome.out, "");
    assert_eq!(outcome.err, "[line 2] Error at ';': Expect expression.\n");
}

#[test]
fn test_lex_and_parse_errors_are_all_reported() {
    let outcome = run("var a = @;\nprint 1");

    assert_eq!(outcome.status, ExitStatus::DataError);
    assert_eq!(
        outcome.err,
        "[line 1] Error: Unexpected character.\n\
         [line 1] Error at ';': Expect expression.\n\
         [line 2] Error at end: Expect ';' after value.\n"
    );
}

#[test]
fn test_deep_recursion_within_limit() {
    assert_eq!(
        run_ok(
            "fun depth(n) {\n\
               if (n == 0) return 0;\n\
               return depth(n - 1) + 1;\n\
             }\n\
             print depth(1000);"
        ),
        "1000\n"
    );
}

#[test]
fn test_unbounded_recursion_is_a_runtime_error() {
    let (out, err) = runtime_error(
        "print \"start\";\n\
         fun forever(n) { return forever(n + 1); }\n\
         forever(0);\n\
         print \"unreached\";",
    );

    assert_eq!(out, "start\n");
    assert_eq!(err, "Stack overflow.\n[line 2]\n");
}
