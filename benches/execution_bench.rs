use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jolt::{Interpreter, Scanner};

const PROGRAM: &str = r#"
(defn fib [n]
  (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))

(defn sum-to [n]
  (loop [i n acc 0]
    (if (= i 0) acc (recur (dec i) (+ acc i)))))

(defmacro unless [test & body]
  `(if ~test nil (do ~@body)))

(let [xs (range 100)]
  (reduce + 0 (map (fn [x] (* x x)) (filter even? xs))))
"#;

fn lexer_benchmark(c: &mut Criterion) {
    c.bench_function("tokenize program", |b| {
        b.iter(|| {
            let mut scanner = Scanner::new(black_box(PROGRAM));
            scanner.scan_tokens().unwrap()
        })
    });
}

fn analyzer_benchmark(c: &mut Criterion) {
    let interp = Interpreter::new();
    let forms = interp.read(PROGRAM).unwrap();

    c.bench_function("analyze program", |b| {
        b.iter(|| {
            for form in &forms {
                black_box(interp.analyze_form(form).unwrap());
            }
        })
    });
}

fn evaluator_benchmark(c: &mut Criterion) {
    let interp = Interpreter::new();
    interp.eval_str(PROGRAM).unwrap();

    c.bench_function("loop/recur 10000", |b| {
        b.iter(|| interp.eval_str(black_box("(sum-to 10000)")).unwrap())
    });

    c.bench_function("fib 15", |b| {
        b.iter(|| interp.eval_str(black_box("(fib 15)")).unwrap())
    });

    c.bench_function("macroexpand and eval", |b| {
        b.iter(|| interp.eval_str(black_box("(unless false (+ 1 2))")).unwrap())
    });
}

criterion_group!(
    benches,
    lexer_benchmark,
    analyzer_benchmark,
    evaluator_benchmark
);
criterion_main!(benches);
