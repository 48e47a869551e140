// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use tinybird_client::appender::QueuingAppender;
use tinybird_client::config::AppenderConfig;
use tinybird_client::record::{Record, Records};
use tinybird_client::sink::{AppendAck, RecordSink, SinkError};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct CollectSink {
    batches: Arc<Mutex<Vec<Records>>>,
}

#[async_trait::async_trait]
impl RecordSink for CollectSink {
    fn name(&self) -> &str {
        "collect"
    }

    async fn append(&self, records: &[Record]) -> Result<AppendAck, SinkError> {
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(AppendAck {
            rows: records.len(),
            quarantined_rows: 0,
        })
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // For any enqueue sequence, the concatenation of dispatched batches is
    // exactly the enqueue sequence, and no batch exceeds the size bound.
    #[test]
    fn dispatch_order_matches_enqueue_order(
        values in proptest::collection::vec(any::<u16>(), 0..96),
        max_batch_size in 1usize..8,
    ) {
        let records: Records = values.iter().map(|v| vec![json!(*v)]).collect();

        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = CollectSink { batches: Arc::clone(&batches) };

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        rt.block_on(async {
            let (tx, rx) = tokio::sync::mpsc::channel(records.len().max(1));
            for record in records.clone() {
                tx.send(record).await.unwrap();
            }
            drop(tx);

            let appender = QueuingAppender::new(
                rx,
                sink,
                AppenderConfig {
                    max_batch_size,
                    max_wait: Duration::from_secs(60),
                    min_interval: Duration::ZERO,
                    dequeue_timeout: Duration::from_millis(5),
                },
                CancellationToken::new(),
            )
            .unwrap();
            appender.run().await;
        });

        let batches = batches.lock().unwrap();
        for batch in batches.iter() {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.len() <= max_batch_size);
        }

        let forwarded: Records = batches.concat();
        prop_assert_eq!(forwarded, records);
    }
}
