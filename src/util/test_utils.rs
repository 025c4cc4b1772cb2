use crate::{
    checker::Checker,
    parser,
    token::Spanned,
    util::{
        fmt::{tree, Context, Show},
        intern::Interner,
    },
};

pub fn format_error<E>(i: &Interner<str>, e: &Spanned<E>) -> String
where
    Spanned<E>: Show,
{
    let ctx = Context { ident_interner: i };
    format!("{:#}", e.display(&ctx))
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CheckerProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the input through the pipeline, returning the printed tree and the
/// error, if any. The tree is empty when some stage fails.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let tokens_buf = &mut Vec::with_capacity(1024);
    let interner = &mut Interner::with_capacity(128);

    let (tree, error) = match test {
        Test::ParserProgram(input) => match parser::parse_program(input, tokens_buf, interner) {
            Ok(program) => {
                let ctx = Context {
                    ident_interner: interner,
                };
                (tree::print_program_string(&ctx, &program), None)
            }
            Err(error) => (String::new(), Some(format_error(interner, &error))),
        },
        Test::ParserExpr(input) => match parser::parse_expr(input, tokens_buf, interner) {
            Ok(expr) => {
                let ctx = Context {
                    ident_interner: interner,
                };
                (tree::print_expr_string(&ctx, &expr), None)
            }
            Err(error) => (String::new(), Some(format_error(interner, &error))),
        },
        Test::CheckerProgram(input) => {
            match parser::parse_program(input, tokens_buf, interner) {
                Err(error) => (String::new(), Some(format_error(interner, &error))),
                Ok(program) => match Checker::with_capacity(128).check(program) {
                    Ok((program, _registry)) => {
                        let ctx = Context {
                            ident_interner: interner,
                        };
                        (tree::print_program_string(&ctx, &program), None)
                    }
                    Err(error) => (String::new(), Some(format_error(interner, &error))),
                },
            }
        }
    };
    (tree, error.into_iter().collect())
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

/// Declares tests that run a source text through a pipeline stage and compare
/// the printed tree or the reported errors.
macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(checker, program), $source:expr) => {
        crate::util::test_utils::Test::CheckerProgram($source)
    };
}
pub(crate) use tree_tests;
