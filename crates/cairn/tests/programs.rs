//! End-to-end tests: source text in, exit code (and console bytes) out.

use cairn::{BufferConsole, Compilation, MapLoader, NoIncludes, NoopTracer, SourceLoader};

fn run(source: &str) -> u32 {
    run_with(source, &NoIncludes, b"").0
}

fn run_with(source: &str, loader: &dyn SourceLoader, input: &[u8]) -> (u32, String) {
    let compilation = Compilation::compile(source, loader).expect("compile should succeed");
    let mut vm = cairn::Vm::new(
        compilation.program.clone(),
        BufferConsole::new(input),
        NoopTracer,
    );
    let exit_code = vm.run().expect("run should succeed");
    (exit_code, vm.console().output_string())
}

#[test]
fn exit_zero() {
    assert_eq!(run("fn main() { __exit__(0); }"), 0);
}

#[test]
fn intrinsic_add() {
    assert_eq!(run("fn main() { __exit__(__iadd__(2, 3)); }"), 5);
}

#[test]
fn local_variable_mutation() {
    assert_eq!(
        run("fn main() { var x = 7; x = __iadd__(x, 3); __exit__(x); }"),
        10
    );
}

#[test]
fn two_argument_call() {
    assert_eq!(
        run("fn f(a, b) { return __iadd__(a, b); } fn main() { __exit__(f(4, 38)); }"),
        42
    );
}

#[test]
fn counting_for_loop() {
    assert_eq!(
        run("fn main() { var i = 0; for (i = 0; __ilt__(i, 5); i = __iadd__(i, 1)) {} __exit__(i); }"),
        5
    );
}

#[test]
fn recursive_factorial() {
    assert_eq!(
        run(concat!(
            "fn fact(n) { if (__ile__(n, 1)) return 1; ",
            "return __imul__(n, fact(__isub__(n, 1))); } ",
            "fn main() { __exit__(fact(6)); }"
        )),
        720
    );
}

#[test]
fn operators_lower_like_intrinsics() {
    assert_eq!(run("fn main() { __exit__(2 + 3 * 4 - 6 / 2); }"), 11);
    assert_eq!(run("fn main() { __exit__(17 % 5); }"), 2);
}

#[test]
fn comparisons_and_swapped_operands() {
    assert_eq!(run("fn main() { __exit__(3 < 4); }"), 1);
    assert_eq!(run("fn main() { __exit__(3 > 4); }"), 0);
    assert_eq!(run("fn main() { __exit__(4 >= 4); }"), 1);
    assert_eq!(run("fn main() { __exit__(4 <= 3); }"), 0);
    assert_eq!(run("fn main() { __exit__(4 == 4); }"), 1);
    assert_eq!(run("fn main() { __exit__(4 != 4); }"), 0);
}

#[test]
fn unary_negation() {
    assert_eq!(run("fn main() { __exit__(-5 + 6); }"), 1);
    assert_eq!(run("fn main() { __exit__(__ineg__(-42)); }"), 42);
}

#[test]
fn char_literals_are_integers() {
    assert_eq!(run("fn main() { __exit__('A'); }"), 65);
    assert_eq!(run(r"fn main() { __exit__('\n'); }"), 10);
    assert_eq!(run(r"fn main() { __exit__('\x2a'); }"), 42);
}

#[test]
fn bool_literals() {
    assert_eq!(run("fn main() { __exit__(true); }"), 1);
    assert_eq!(run("fn main() { __exit__(false); }"), 0);
}

#[test]
fn ternary_folds_constant_conditions() {
    assert_eq!(run("fn main() { __exit__(1 ? 42 : 7); }"), 42);
    assert_eq!(run("fn main() { __exit__(0 ? 7 : 42); }"), 42);
}

#[test]
fn ternary_with_runtime_condition() {
    assert_eq!(
        run("fn main() { var x = 3; __exit__(x < 4 ? 10 : 20); }"),
        10
    );
}

#[test]
fn short_circuit_or_and() {
    assert_eq!(run("fn main() { __exit__(0 || 1); }"), 1);
    assert_eq!(run("fn main() { __exit__(0 && 1); }"), 0);
    // the right side must not run when the left decides
    assert_eq!(
        run(concat!(
            "fn boom() { return __idiv__(1, 0); } ",
            "fn main() { __exit__(1 || boom()); }"
        )),
        1
    );
    assert_eq!(
        run(concat!(
            "fn boom() { return __idiv__(1, 0); } ",
            "fn main() { __exit__(0 && boom()); }"
        )),
        0
    );
}

#[test]
fn while_loops_run() {
    assert_eq!(
        run(concat!(
            "fn main() { var n = 1; var i = 0; ",
            "while (i < 5) { n = n * 2; i = i + 1; } ",
            "__exit__(n); }"
        )),
        32
    );
}

#[test]
fn pointers_store_through_addresses() {
    assert_eq!(
        run("fn main() { var x = 1; var p = &x; *p = 42; __exit__(x); }"),
        42
    );
    assert_eq!(
        run("fn main() { var x = 9; var p = &x; __exit__(*p); }"),
        9
    );
}

#[test]
fn arrays_through_pointers() {
    assert_eq!(
        run(concat!(
            "fn main() { var buf[3]; var p = &buf; ",
            "p[0] = 10; p[1] = 20; p[2] = 12; ",
            "__exit__(p[0] + p[1] + p[2]); }"
        )),
        42
    );
}

#[test]
fn global_variables_live_in_data_words() {
    assert_eq!(run("var g = 5; fn main() { __exit__(*g); }"), 5);
    assert_eq!(
        run("var g; fn main() { *g = 7; __exit__(*g); }"),
        7
    );
    assert_eq!(
        run(concat!(
            "var table[3]; ",
            "fn main() { table[0] = 1; table[2] = 41; __exit__(table[0] + table[2]); }"
        )),
        42
    );
}

#[test]
fn lambdas_are_callable_values() {
    assert_eq!(
        run("fn main() { var f = lambda x: __iadd__(x, 1); __exit__(f(41)); }"),
        42
    );
    assert_eq!(
        run(concat!(
            "fn apply(f, v) { return f(v); } ",
            "fn main() { __exit__(apply(lambda x: x * 2, 21)); }"
        )),
        42
    );
}

#[test]
fn function_addresses_flow_through_variables() {
    assert_eq!(
        run(concat!(
            "fn inc(x) { return x + 1; } ",
            "fn main() { var f = inc; __exit__(f(41)); }"
        )),
        42
    );
}

#[test]
fn overloads_select_by_arity() {
    assert_eq!(
        run(concat!(
            "fn area(w) { return __imul__(w, w); } ",
            "fn area(w, h) { return __imul__(w, h); } ",
            "fn main() { __exit__(__iadd__(area(3), area(2, 5))); }"
        )),
        19
    );
}

#[test]
fn inline_callables_expand_at_call_sites() {
    assert_eq!(
        run(concat!(
            "inline twice(x) { return __imul__(x, 2); } ",
            "fn main() { __exit__(twice(21)); }"
        )),
        42
    );
}

#[test]
fn inline_writeback_mutates_the_argument() {
    assert_eq!(
        run(concat!(
            "inline bump(writeback x, d) { return __iadd__(x, d); } ",
            "fn main() { var v = 5; bump(v, 3); __exit__(v); }"
        )),
        8
    );
}

#[test]
fn nested_inline_expansion_restores_bindings() {
    assert_eq!(
        run(concat!(
            "inline twice(x) { return __imul__(x, 2); } ",
            "fn main() { __exit__(twice(twice(10)) + 2); }"
        )),
        42
    );
}

#[test]
fn aliases_redirect_to_their_targets() {
    assert_eq!(
        run("fn main() { var x = 40; alias y for x; y = y + 2; __exit__(x); }"),
        42
    );
}

#[test]
fn scoped_blocks_share_the_frame() {
    assert_eq!(
        run("fn main() { var x = 1; { var y = 2; x = x + y; } __exit__(x); }"),
        3
    );
}

#[test]
fn typed_declarations_run_like_untyped_ones() {
    assert_eq!(
        run(concat!(
            "typedef word; typedef cell like word; ",
            "fn main() { var a: word = 40; var b: cell = 2; __exit__(a + b); }"
        )),
        42
    );
}

#[test]
fn return_without_value_yields_zero() {
    assert_eq!(run("fn f() { return; } fn main() { __exit__(f()); }"), 0);
}

#[test]
fn function_without_return_hits_the_guard() {
    assert_eq!(run("fn f() { ; } fn main() { __exit__(f()); }"), 0);
}

#[test]
fn mutual_recursion_resolves_forward() {
    assert_eq!(
        run(concat!(
            "fn even(n) { if (n == 0) return 1; return odd(n - 1); } ",
            "fn odd(n) { if (n == 0) return 0; return even(n - 1); } ",
            "fn main() { __exit__(even(10)); }"
        )),
        1
    );
}

#[test]
fn putc_writes_and_getc_reads() {
    let (code, output) = run_with(
        concat!(
            "fn main() { var c = __getc__(); ",
            "while (c != __ineg__(1)) { __putc__(c); c = __getc__(); } ",
            "__exit__(0); }"
        ),
        &NoIncludes,
        b"echo",
    );
    assert_eq!(code, 0);
    assert_eq!(output, "echo");
}

#[test]
fn hello_world_prints_bytes() {
    let (code, output) = run_with(
        concat!(
            "fn main() { __putc__('h'); __putc__('i'); __putc__('\\n'); __exit__(0); }"
        ),
        &NoIncludes,
        b"",
    );
    assert_eq!(code, 0);
    assert_eq!(output, "hi\n");
}

#[test]
fn includes_compile_once_and_link() {
    let loader = MapLoader::default().with(
        "math",
        "fn square(x) { return x * x; }\nfn cube(x) { return x * square(x); }\n",
    );
    let (code, _) = run_with(
        concat!(
            "include math; ",
            "fn main() { __exit__(cube(3) + square(4) - 1); }"
        ),
        &loader,
        b"",
    );
    assert_eq!(code, 42);
}

#[test]
fn main_return_value_feeds_the_exit_wiring() {
    assert_eq!(run("fn main() { return 42; }"), 42);
}

#[test]
fn exit_code_is_a_raw_word() {
    assert_eq!(run("fn main() { __exit__(__ineg__(1)); }"), u32::MAX);
}
