//! End-to-end tests of the single-port transport: gRPC and HTTP against a
//! live listener.

mod common;

use common::{TestServer, narinfo_text, test_nar_data, test_store_path};
use meshix_core::Package;
use meshix_proto::MeshixServiceClient;
use meshix_proto::proto::{self, ListPackagesRequest, PushPackageRequest};
use reqwest::StatusCode;

async fn grpc_client(addr: std::net::SocketAddr) -> MeshixServiceClient<tonic::transport::Channel> {
    MeshixServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap()
}

fn package(name: &str, version: &str, main_bin: &str) -> proto::Package {
    let (_, path) = test_store_path(&format!("{name}-{version}"));
    Package::new(name, version, path, main_bin).into()
}

#[tokio::test]
async fn push_then_list_over_grpc() {
    let server = TestServer::new().await;
    let addr = server.spawn().await;
    let mut client = grpc_client(addr).await;

    let pushed = package("ripgrep", "14.1.0", "rg");
    client
        .push_package(PushPackageRequest {
            package: Some(pushed.clone()),
        })
        .await
        .unwrap();

    let listed = client
        .list_packages(ListPackagesRequest {})
        .await
        .unwrap()
        .into_inner()
        .packages;
    assert_eq!(listed, vec![pushed.clone()]);

    let meta = listed[0].nix_metadata.as_ref().unwrap();
    assert_eq!(listed[0].name, "ripgrep");
    assert_eq!(listed[0].version, "14.1.0");
    assert_eq!(meta.main_bin, "rg");
    assert_eq!(
        meta.store_path,
        pushed.nix_metadata.as_ref().unwrap().store_path
    );
}

#[tokio::test]
async fn list_keeps_push_order_and_duplicates() {
    let server = TestServer::new().await;
    let addr = server.spawn().await;
    let mut client = grpc_client(addr).await;

    let a = package("zlib", "1.3", "minigzip");
    let b = package("bash", "5.2", "bash");
    for pkg in [&a, &b, &a] {
        client
            .push_package(PushPackageRequest {
                package: Some(pkg.clone()),
            })
            .await
            .unwrap();
    }

    let listed = client
        .list_packages(ListPackagesRequest {})
        .await
        .unwrap()
        .into_inner()
        .packages;
    assert_eq!(listed, vec![a.clone(), b, a]);
}

#[tokio::test]
async fn invalid_push_is_invalid_argument() {
    let server = TestServer::new().await;
    let addr = server.spawn().await;
    let mut client = grpc_client(addr).await;

    let status = client
        .push_package(PushPackageRequest {
            package: Some(package("hello", "2.12.1", "")),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
}

#[tokio::test]
async fn http_and_grpc_share_the_port() {
    let server = TestServer::new().await;
    let addr = server.spawn().await;
    let base = format!("http://{addr}");

    let http1 = reqwest::Client::new();
    let response = http1
        .get(format!("{base}/cache/nix-cache-info"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Priority: 39"));

    // HTTP/2 without a gRPC content type still reaches the cache
    let http2 = reqwest::Client::builder()
        .http2_prior_knowledge()
        .build()
        .unwrap();
    let (hash, path) = test_store_path("hello");
    let response = http2
        .put(format!("{base}/cache/{hash}.narinfo"))
        .body(narinfo_text(&path, &hash, &test_nar_data(256)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.version(), reqwest::Version::HTTP_2);
    assert_eq!(response.status(), StatusCode::OK);

    let response = http2
        .get(format!("{base}/cache/{hash}.narinfo"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Sig: meshix-test-1:"));

    let mut client = grpc_client(addr).await;
    let listed = client.list_packages(ListPackagesRequest {}).await.unwrap();
    assert!(listed.into_inner().packages.is_empty());
}

#[tokio::test]
async fn grpc_content_type_over_http1_is_not_grpc() {
    let server = TestServer::new().await;
    let addr = server.spawn().await;

    let response = reqwest::Client::new()
        .post(format!(
            "http://{addr}/meshix.v1.MeshixService/ListPackages"
        ))
        .header("content-type", "application/grpc")
        .body(Vec::<u8>::new())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
