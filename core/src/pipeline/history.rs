use super::{Middleware, Next};
use crate::Result;
use bytes::Bytes;
use http::{Request, Response};
use std::sync::{Arc, Mutex};

/// One request seen by [`History`] and what came back for it.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// The request as it left this stage.
    pub request: Request<Bytes>,
    /// The response, if the inner stages produced one.
    pub response: Option<Response<Bytes>>,
    /// The error message, if the inner stages failed.
    pub error: Option<String>,
}

/// History records every request/response pair that passes through it.
///
/// Clones share the same record, keep one handle and push the other into
/// the stack under the `history` name.
#[derive(Debug, Clone, Default)]
pub struct History {
    transactions: Arc<Mutex<Vec<Transaction>>>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded transactions, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.lock().expect("lock poisoned").clone()
    }

    /// Number of recorded transactions.
    pub fn len(&self) -> usize {
        self.transactions.lock().expect("lock poisoned").len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl Middleware for History {
    async fn handle(&self, req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>> {
        let request = req.clone();
        let result = next.run(req).await;

        let (response, error) = match &result {
            Ok(resp) => (Some(resp.clone()), None),
            Err(err) => (None, Some(err.to_string())),
        };
        self.transactions
            .lock()
            .expect("lock poisoned")
            .push(Transaction {
                request,
                response,
                error,
            });

        result
    }
}
