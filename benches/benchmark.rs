use criterion::{black_box, criterion_group, criterion_main, Criterion};
use robo::{
    rule::RuleIndex, wire, AgentContext, Event, EventPayload, EventType, Rule, SimpleRule,
};

fn bench_wire(c: &mut Criterion) {
    let event = Event::new(EventPayload::EnableRelay {
        relay: "pump".into(),
    })
    .with_name("cmd");
    let message = wire::encode_string(&event).unwrap();

    c.bench_function("wire encode", |b| {
        b.iter(|| wire::encode_string(black_box(&event)).unwrap())
    });
    c.bench_function("wire decode", |b| {
        b.iter(|| wire::decode_str(black_box(&message)).unwrap())
    });
}

fn bench_rule_dispatch(c: &mut Criterion) {
    let mut counter = 0u64;
    let mut rules = RuleIndex::new();
    let staged: Vec<Box<dyn Rule<u64>>> = (0..16)
        .map(|i| {
            let rule = SimpleRule::<u64>::on(EventType::custom(format!("E{}", i % 4)))
                .always(|cx| {
                    *cx.agent += 1;
                    Ok(Vec::new())
                });
            Box::new(rule) as Box<dyn Rule<u64>>
        })
        .collect();
    rules.activate(staged, &mut counter, "bench");

    let ctx = AgentContext::detached("bench");
    let event = Event::custom("E1");
    c.bench_function("rule dispatch", |b| {
        b.iter(|| {
            rules
                .execute(&mut counter, black_box(&event), &ctx)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_wire, bench_rule_dispatch);
criterion_main!(benches);
