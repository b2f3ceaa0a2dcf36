use adcore::{build_index, AdQuery, InMemoryCatalog, Item, ItemStatus, RankingEngine};
use criterion::{criterion_group, criterion_main, Criterion};

const PLACEMENTS: &[&str] = &["homepage_top", "video_preroll", "article_inline_1", "footer_banner"];
const TAGS: &[&str] = &["sports", "travel", "fashion", "electronics", "home", "food", "gaming", "beauty"];

fn synthetic_catalog(n: usize) -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    for i in 0..n {
        let tags = if i % 10 == 0 { vec![] } else { vec![TAGS[i % TAGS.len()].to_string()] };
        catalog.insert(Item {
            id: format!("li_{i:06}"),
            name: format!("Line item {i}"),
            advertiser_id: format!("adv{}", i % 97),
            bid: 0.1 + (i % 100) as f64 * 0.099,
            budget: 5000.0,
            placement: PLACEMENTS[i % PLACEMENTS.len()].to_string(),
            categories: tags.clone(),
            keywords: tags,
            status: ItemStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
        });
    }
    catalog
}

fn bench_rank(c: &mut Criterion) {
    let catalog = synthetic_catalog(5_000);
    let index = build_index(catalog.snapshot());
    let engine = RankingEngine::default();
    let query = AdQuery::new("homepage_top", 4).keyword("sports").category("sports");
    c.bench_function("rank_5k_items", |b| b.iter(|| engine.rank(&index, &catalog, &query)));
    c.bench_function("build_5k_items", |b| b.iter(|| build_index(catalog.snapshot())));
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
