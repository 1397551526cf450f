use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;
use std::sync::Arc;

use super::types::{session_keys, task_ids};
use super::utils::{require, snapshot};
use crate::documents::DocumentVerifier;
use crate::model::ClaimRecord;

pub struct VerifyDocumentsTask {
    verifier: Arc<DocumentVerifier>,
}

impl VerifyDocumentsTask {
    pub fn new(verifier: Arc<DocumentVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Task for VerifyDocumentsTask {
    fn id(&self) -> &str {
        task_ids::DOCUMENTS
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let claim: ClaimRecord = require(&context, session_keys::CLAIM).await?;

        let status = self
            .verifier
            .verify(&claim.claim_type, &claim.submitted_documents);
        context.set(session_keys::DOCUMENTS, &status).await;

        let response = if status.complete {
            "All required documents submitted".to_string()
        } else {
            format!("Missing {} document(s)", status.missing.len())
        };
        Ok(
            TaskResult::new(Some(response), NextAction::Continue).with_snapshot(
                json!({
                    "claim_type": claim.claim_type,
                    "submitted_documents": claim.submitted_documents,
                }),
                snapshot(&status),
            ),
        )
    }
}
