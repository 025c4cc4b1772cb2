use criterion::{criterion_group, criterion_main, Criterion};
use plume::{lexer::Lexer, token::TokenKind};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/big.plume");

fn lexer(input: &str) {
    let mut lexer = Lexer::new(input);
    let mut i = 0;
    loop {
        let token = lexer.next_token();
        match token.kind {
            TokenKind::Eof => break,
            kind if kind.is_trivia() || kind.is_error() => continue,
            _ => i += 1,
        }
    }
    black_box(i);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lexer", |b| {
        b.iter(|| {
            black_box(lexer(black_box(INPUT)));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
