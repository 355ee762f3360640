use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use metrics_util::debugging::DebuggingRecorder;
use tiercache::cache::metrics::{
    METRIC_COALESCED_TOTAL, METRIC_COMPUTE_ERROR_TOTAL, METRIC_COMPUTE_MS, METRIC_COMPUTE_TOTAL,
    METRIC_LOOKUP_HIT_TOTAL, METRIC_LOOKUP_MISS_TOTAL, METRIC_WRITE_THROUGH_FAILURE_TOTAL,
};
use tiercache::infra::telemetry;
use tiercache::layers::{DirectoryLayer, ShardedLayer};
use tiercache::{ComputeError, FnResource, Provisioner};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn provisioning_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let dir = tempfile::tempdir().expect("tempdir");
    // A plain file where the directory tier expects a shard directory makes
    // every write to that tier fail.
    let blocked_root = dir.path().join("blocked");
    let provisioner = Arc::new(Provisioner::new());
    provisioner.register_layer(ShardedLayer::new());
    provisioner.register_layer(DirectoryLayer::new(&blocked_root).expect("directory tier"));
    std::fs::remove_dir(&blocked_root).expect("remove tier root");
    std::fs::write(&blocked_root, b"not a directory").expect("block tier root");

    provisioner.register_resource(
        "getUser",
        FnResource::new([0, 1], |slug, params| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ComputeError>(Bytes::from(format!("{slug}:{}", params.join("-"))))
        }),
    );
    provisioner.register_resource(
        "failing",
        FnResource::new([0], |_slug, _params| async move {
            Err::<Bytes, _>(ComputeError::msg("boom"))
        }),
    );

    // Miss, coalesced computation, write-through failure on the directory tier.
    let tasks = (0..4).map(|_| {
        let provisioner = Arc::clone(&provisioner);
        tokio::spawn(async move { provisioner.provide("getUser", ["2", "3"]).await })
    });
    for joined in join_all(tasks).await {
        joined.expect("task").expect("value");
    }

    // Hit.
    provisioner.provide("getUser", ["2", "3"]).await.expect("value");

    // Computation error.
    provisioner
        .provide("failing", ["1"])
        .await
        .expect_err("computation error");

    let metric_names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        METRIC_LOOKUP_HIT_TOTAL,
        METRIC_LOOKUP_MISS_TOTAL,
        METRIC_COMPUTE_TOTAL,
        METRIC_COMPUTE_ERROR_TOTAL,
        METRIC_COMPUTE_MS,
        METRIC_COALESCED_TOTAL,
        METRIC_WRITE_THROUGH_FAILURE_TOTAL,
    ] {
        assert!(
            metric_names.contains(expected),
            "missing metric `{expected}` in {metric_names:?}"
        );
    }
}
