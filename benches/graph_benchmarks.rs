use criterion::{black_box, criterion_group, criterion_main, Criterion};

use garnet_graphics::{
    AliasingEntry, GraphResult, MemoryAliaser, NullBackend, PassGraph, PixelFormat,
    RenderContext, RenderExecutor, RenderPass, ResourceScheduler, ResourceStorage,
    TextureProperties,
};

// ---------------------------------------------------------------------------
// Memory aliaser packing
// ---------------------------------------------------------------------------

fn packing_workload(count: u64) -> MemoryAliaser {
    let mut aliaser = MemoryAliaser::new();
    for i in 0..count {
        let first = (i % 13) as usize;
        let last = first + (i % 5) as usize;
        aliaser.add_entry(AliasingEntry::new(
            format!("resource_{i}"),
            (first, last),
            4096 + (i * 977) % 65536,
        ));
    }
    aliaser
}

fn bench_aliaser_small(c: &mut Criterion) {
    c.bench_function("aliaser_pack_16_entries", |b| {
        b.iter_with_setup(|| packing_workload(16), |aliaser| black_box(aliaser.alias()));
    });
}

fn bench_aliaser_large(c: &mut Criterion) {
    c.bench_function("aliaser_pack_256_entries", |b| {
        b.iter_with_setup(|| packing_workload(256), |aliaser| black_box(aliaser.alias()));
    });
}

// ---------------------------------------------------------------------------
// Full frame: schedule, allocate, record
// ---------------------------------------------------------------------------

struct ChainPass {
    name: String,
    index: usize,
}

impl RenderPass for ChainPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, scheduler: &mut ResourceScheduler<'_>) -> GraphResult<()> {
        let target = format!("target_{}", self.index);
        scheduler.new_texture(
            &target,
            TextureProperties::new_2d(512, 512, PixelFormat::Rgba16Float).as_render_target(),
        );
        scheduler.will_write_rt(&target);
        if self.index > 0 {
            scheduler.will_read(&format!("target_{}", self.index - 1));
        }
        Ok(())
    }

    fn execute(&self, _ctx: &mut RenderContext<'_>) -> GraphResult<()> {
        Ok(())
    }
}

fn chain_passes(count: usize) -> Vec<Box<dyn RenderPass>> {
    (0..count)
        .map(|index| {
            Box::new(ChainPass {
                name: format!("pass_{index}"),
                index,
            }) as Box<dyn RenderPass>
        })
        .collect()
}

fn bench_frame_chain(c: &mut Criterion) {
    c.bench_function("frame_16_pass_chain", |b| {
        b.iter_with_setup(
            || {
                let passes = chain_passes(16);
                let mut graph = PassGraph::new();
                for pass in &passes {
                    graph.add_pass(pass.name()).unwrap();
                }
                (passes, ResourceStorage::new(graph), NullBackend::new())
            },
            |(passes, mut storage, backend)| {
                let mut executor = RenderExecutor::new();
                executor
                    .execute_frame(0, &passes, &mut storage, &backend)
                    .unwrap();
                black_box(storage);
            },
        );
    });
}

fn bench_stable_frame(c: &mut Criterion) {
    c.bench_function("frame_16_pass_chain_stable_layout", |b| {
        b.iter_with_setup(
            || {
                let passes = chain_passes(16);
                let mut graph = PassGraph::new();
                for pass in &passes {
                    graph.add_pass(pass.name()).unwrap();
                }
                let mut storage = ResourceStorage::new(graph);
                let backend = NullBackend::new();
                let mut executor = RenderExecutor::new();
                executor
                    .execute_frame(0, &passes, &mut storage, &backend)
                    .unwrap();
                (passes, storage, backend, executor)
            },
            |(passes, mut storage, backend, mut executor)| {
                executor
                    .execute_frame(1, &passes, &mut storage, &backend)
                    .unwrap();
                black_box(storage);
            },
        );
    });
}

criterion_group!(
    benches,
    bench_aliaser_small,
    bench_aliaser_large,
    bench_frame_chain,
    bench_stable_frame
);
criterion_main!(benches);
