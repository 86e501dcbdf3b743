use criterion::{criterion_group, criterion_main, Criterion};
use kiln_core::{BlobResource, DeviceHandle, Resource, ResourceHash, ResourceType, SceneId};
use kiln_data::ResourceRegistry;
use std::hint::black_box;
use std::sync::Arc;

const RESOURCE_COUNT: u64 = 10_000;

fn populated_registry() -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    for n in 0..RESOURCE_COUNT {
        let hash = ResourceHash::from_parts(n, 0);
        registry.register_resource(hash);
        registry.add_resource_ref(hash, SceneId(n % 8));
    }
    registry
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resource Registry");

    group.bench_function("Scene ref churn (add + remove)", |b| {
        let mut registry = populated_registry();
        b.iter(|| {
            for n in (0..RESOURCE_COUNT).step_by(7) {
                let hash = ResourceHash::from_parts(n, 0);
                registry.add_resource_ref(hash, SceneId(99));
                registry.remove_resource_ref(hash, SceneId(99));
            }
            black_box(registry.resource_count());
        });
    });

    group.bench_function("Provide then upload", |b| {
        let payload = vec![0u8; 64];
        b.iter_batched(
            populated_registry,
            |mut registry| {
                for n in 0..RESOURCE_COUNT {
                    let hash = ResourceHash::from_parts(n, 0);
                    let resource: Arc<dyn Resource> = Arc::new(
                        BlobResource::new(ResourceType::VertexBuffer, payload.clone())
                            .with_hash(hash),
                    );
                    registry.set_resource_data(hash, resource);
                }
                for n in 0..RESOURCE_COUNT {
                    let hash = ResourceHash::from_parts(n, 0);
                    registry.set_resource_uploaded(hash, DeviceHandle(n), 64);
                }
                black_box(registry.all_provided_resources().len());
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_registry);
criterion_main!(benches);
