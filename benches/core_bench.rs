use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hunter_search::arith::{Crt, CrtComponent};
use hunter_search::congruence::{CongruenceGenerator, CongruenceLookup};
use hunter_search::coordinator::process_unit;
use hunter_search::degree::{Quintic, Sextic};
use hunter_search::horner::{Exact, HornerTree};
use hunter_search::polgen::{EngineConfig, PolGenerator};
use hunter_search::simple::SimplePolGenerator;

const TOY_TREE: &str = "[[1],[],[1,,]]";
const DENSE_TREE: &str = "[[[1,-2,3],[0,4,1],[5,,-1]],[[2,2],[1],[,3]],[[7,0,1],[-1,1],[4]]]";

fn bench_horner_incremental(c: &mut Criterion) {
    let mut tree = HornerTree::parse(Exact, DENSE_TREE).unwrap();
    c.bench_function("horner eval depth 0 (dense, exact)", |b| {
        tree.eval_i64(2, 17);
        tree.eval_i64(1, -5);
        let mut x = 0;
        b.iter(|| {
            x += 1;
            tree.eval_i64(0, black_box(x));
        });
    });
}

fn bench_congruence_generate(c: &mut Criterion) {
    c.bench_function("congruence generate (toy tree, mod 101)", |b| {
        let mut gen = CongruenceGenerator::new(TOY_TREE, 101).unwrap();
        let prefix: &[i64] = &[];
        b.iter(|| gen.generate(black_box(prefix)).unwrap().len());
    });
}

fn bench_lookup_walk(c: &mut Criterion) {
    let mut gen = CongruenceGenerator::new(DENSE_TREE, 13).unwrap();
    let tuples = gen.generate(&[]).unwrap();
    let mut lookup = CongruenceLookup::new(&tuples, &gen.moduli()).unwrap();
    c.bench_function("lookup walk/back (depth 3, mod 13)", |b| {
        b.iter(|| {
            for a in 0..13 {
                if lookup.walk(black_box(a)) {
                    lookup.walk(black_box(a + 1));
                    lookup.back();
                }
                lookup.back();
            }
        });
    });
}

fn bench_crt_combine_all(c: &mut Criterion) {
    let crt = Crt::new(&[
        CrtComponent { modulus: 7, scale: 1 },
        CrtComponent { modulus: 11, scale: 1 },
        CrtComponent { modulus: 13, scale: 1 },
    ])
    .unwrap();
    let a: Vec<i64> = (0..4).collect();
    let b_: Vec<i64> = (0..6).collect();
    let c_: Vec<i64> = (0..7).collect();
    c.bench_function("crt combine_all (4 x 6 x 7)", |b| {
        let sets: [&[i64]; 3] = [&a, &b_, &c_];
        b.iter(|| crt.combine_all(black_box(&sets)));
    });
}

fn bench_sextic_units(c: &mut Criterion) {
    c.bench_function("sextic units (fixed [0], width 2)", |b| {
        b.iter(|| {
            SimplePolGenerator::<Sextic>::new(&[0], 2, vec![1; 7], black_box(-9_747))
                .into_units()
                .count()
        });
    });
}

fn bench_toy_unit(c: &mut Criterion) {
    let engine = EngineConfig::new(5, &[1; 5], 1609, TOY_TREE);
    let mut gen = PolGenerator::<Quintic>::new(&engine).unwrap();
    c.bench_function("process_unit (quintic toy tree)", |b| {
        let unit: &[i64] = &[0, 1, 0];
        b.iter(|| process_unit(&mut gen, black_box(unit)).1);
    });
}

criterion_group!(
    benches,
    bench_horner_incremental,
    bench_congruence_generate,
    bench_lookup_walk,
    bench_crt_combine_all,
    bench_sextic_units,
    bench_toy_unit,
);
criterion_main!(benches);
