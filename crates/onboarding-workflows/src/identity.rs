// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! KYC child process: supplier validation, then internal verification.
//!
//! A rejection at either step is returned as a [`VerificationResult`] with
//! `passed == false`; the process itself only fails on runtime faults.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use durable_runtime::{Process, ProcessContext, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::activities::Activities;
use crate::gateway::ActivityGateway;
use crate::models::{DocumentUpload, VerificationResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityVerificationInput {
    pub merchant_id: String,
    pub document_id: String,
}

pub struct IdentityVerificationProcess {
    activities: Arc<dyn Activities>,
}

impl IdentityVerificationProcess {
    pub fn new(activities: Arc<dyn Activities>) -> Self {
        Self { activities }
    }
}

fn rejection(merchant_id: &str, step: &str, cause: impl Display) -> VerificationResult {
    VerificationResult::failed(
        format!("KYC-FAIL-{}", merchant_id),
        format!("{} failed: {}", step, cause),
    )
}

#[async_trait]
impl Process for IdentityVerificationProcess {
    const NAME: &'static str = "identity-verification";
    type Input = IdentityVerificationInput;
    type Output = VerificationResult;

    #[instrument(
        skip_all,
        fields(instance_id = %ctx.instance_id(), merchant_id = %input.merchant_id)
    )]
    async fn run(
        &self,
        ctx: &ProcessContext,
        input: IdentityVerificationInput,
    ) -> Result<VerificationResult> {
        let merchant_id = input.merchant_id.as_str();
        info!(document_id = %input.document_id, "Identity verification started");

        let gateway = ActivityGateway::new(ctx, self.activities.as_ref());

        let document = DocumentUpload::government_id(merchant_id, input.document_id.as_str());
        let supplier = match gateway.validate_with_supplier(&document).await? {
            Ok(result) if result.passed => result,
            Ok(result) => {
                info!(details = %result.details, "Supplier did not verify the document");
                return Ok(rejection(merchant_id, "Supplier validation", result.details));
            }
            Err(failure) => {
                error!(error = %failure, "Supplier validation failed");
                return Ok(rejection(merchant_id, "Supplier validation", failure));
            }
        };
        info!(verification_id = %supplier.verification_id, "Supplier validation passed");

        let internal = match gateway.perform_internal_verifications(merchant_id).await? {
            Ok(result) if result.passed => result,
            Ok(result) => {
                info!(details = %result.details, "Internal verification did not pass");
                return Ok(rejection(merchant_id, "Internal verifications", result.details));
            }
            Err(failure) => {
                error!(error = %failure, "Internal verifications failed");
                return Ok(rejection(merchant_id, "Internal verifications", failure));
            }
        };
        info!(verification_id = %internal.verification_id, "Internal verifications passed");

        Ok(VerificationResult::passed(
            format!("KYC-{}", merchant_id),
            "All KYC checks passed (supplier + internal)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_shape() {
        let result = rejection("M1", "Supplier validation", "document expired");
        assert!(!result.passed);
        assert_eq!(result.verification_id, "KYC-FAIL-M1");
        assert_eq!(result.details, "Supplier validation failed: document expired");
    }

    #[test]
    fn test_input_is_camel_case() {
        let input = IdentityVerificationInput {
            merchant_id: "M1".to_string(),
            document_id: "123".to_string(),
        };
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["merchantId"], "M1");
        assert_eq!(value["documentId"], "123");
    }
}
