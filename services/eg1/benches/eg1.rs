use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::LazyLock;

use bytes::Bytes;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use edgegrid_core::{Context, SignRequest, SigningRequest};
use edgegrid_eg1::{
    auth_header_prefix, canonicalize, sign, Credential, RequestSigner, SigningOverrides,
    Timestamp,
};

criterion_group!(benches, bench);
criterion_main!(benches);

static RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("must success")
});

fn request(body: &'static [u8]) -> http::Request<Bytes> {
    let mut req = http::Request::post("https://akaa-baseurl-xxxxxxxxxxx.luna.akamaiapis.net/testapi/v1/t3?q=1")
        .header("Content-Type", "application/json")
        .body(Bytes::from_static(body))
        .expect("request must be valid");
    req.extensions_mut().insert(
        SigningOverrides::default()
            .with_timestamp(Timestamp::from_str("20140321T19:34:21+0000").expect("must valid"))
            .with_nonce("nonce-xx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"),
    );
    req
}

pub fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("eg1");
    let cred = Credential::new(
        "akab-client-token-xxx-xxxxxxxxxxxxxxxx",
        "SOMESECRET",
        "akab-access-token-xxx-xxxxxxxxxxxxxxxx",
    );

    group.bench_function("sign_request", |b| {
        let signer = RequestSigner::new().with_headers_to_sign(["Content-Type"]);
        let ctx = Context::new();

        b.to_async(&*RUNTIME).iter(|| async {
            let (mut parts, body) = request(br#"{"a":1}"#).into_parts();
            signer
                .sign_request(&ctx, &mut parts, &body, Some(&cred))
                .await
                .expect("must success")
        })
    });

    group.bench_function("sign_large_body", |b| {
        static BODY: [u8; 1 << 16] = [b'x'; 1 << 16];
        let signer = RequestSigner::new()
            .with_max_body_size(NonZeroUsize::new(1 << 16).expect("must be positive"));
        let ctx = Context::new();

        b.to_async(&*RUNTIME).iter(|| async {
            let (mut parts, body) = request(&BODY).into_parts();
            signer
                .sign_request(&ctx, &mut parts, &body, Some(&cred))
                .await
                .expect("must success")
        })
    });

    group.bench_function("canonicalize_and_sign", |b| {
        let timestamp = Timestamp::from_str("20140321T19:34:21+0000").expect("must valid");
        let headers = vec!["Content-Type".to_string()];
        let prefix = auth_header_prefix(&cred, &timestamp, "nonce");

        b.iter(|| {
            let (mut parts, body) = request(br#"{"a":1}"#).into_parts();
            let req = SigningRequest::build(&mut parts).expect("must success");
            let creq = canonicalize(&req, &body, &headers, 2048, &prefix).expect("must success");
            sign(&creq, &cred, &timestamp)
        })
    });

    group.finish()
}
