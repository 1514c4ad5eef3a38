use core::{fmt, hint::black_box, time::Duration};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::{net::TcpListener, runtime::Builder};
use tonic::{codec::CompressionEncoding, transport::Channel};
use vip_core::proto::{GetIsVipByIdRequest, vip_client::VipClient};
use vip_server::{GrpcServer, ServerConfig, StaticResolver};

#[derive(Clone, Copy, Debug)]
enum Compression {
    None,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

fn grpc_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    let handle = rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            reflection: false,
            ..ServerConfig::default()
        };
        GrpcServer::new(config, Arc::new(StaticResolver::default()))
            .start(Some(listener))
            .await
            .expect("failed to start server")
    });
    let uri = format!("http://{}", handle.local_addr());

    let concurrency_cases = [1, 8, 64];
    let compression_cases = [Compression::None, Compression::Zstd, Compression::Gzip];
    let ids = ["Shahar", "Nobody", "Kiddon", "Bob"];

    let mut group = c.benchmark_group("grpc/get_is_vip_by_id");
    group.measurement_time(Duration::from_secs(5));

    for &concurrency in &concurrency_cases {
        for &compression in &compression_cases {
            let client = rt.block_on(async {
                let channel = Channel::from_shared(uri.clone())
                    .unwrap()
                    .connect()
                    .await
                    .unwrap();
                let mut client = VipClient::new(channel);
                if let Some(encoding) = Option::<CompressionEncoding>::from(compression) {
                    client = client
                        .send_compressed(encoding)
                        .accept_compressed(encoding);
                }
                client
            });

            group.throughput(Throughput::Elements(concurrency as u64));
            group.bench_function(
                format!("conc/{concurrency}/comp/{compression}"),
                |b| {
                    b.to_async(&rt).iter_custom(|iters| {
                        let client = client.clone();
                        async move {
                            let start = Instant::now();
                            for _ in 0..iters {
                                let calls = (0..concurrency).map(|i| {
                                    let mut client = client.clone();
                                    let vip_id = ids[i % ids.len()].to_string();
                                    async move {
                                        let response = client
                                            .get_is_vip_by_id(GetIsVipByIdRequest { vip_id })
                                            .await
                                            .expect("lookup failed");
                                        black_box(response.into_inner().is_vip);
                                    }
                                });
                                join_all(calls).await;
                            }
                            start.elapsed()
                        }
                    });
                },
            );
        }
    }
    group.finish();

    rt.block_on(handle.drain()).unwrap();
}

criterion_group!(benches, grpc_bench);
criterion_main!(benches);
