//! Translation state machine driver.
//!
//! `Pending` records are claimed in batches; each ends the sweep as
//! `Translated` or `Failed`. A separate, slower sweep moves `Failed` records
//! under the retry ceiling back to `Pending`.

use std::sync::Arc;

use metrics::counter;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{needs_translation, DynTranslator};
use crate::config::TranslationConfig;
use crate::error::{PipelineError, TranslateError};
use crate::ingest::scheduler::RunGuard;
use crate::store::{NewsRecord, Store, TranslatedFields};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        metrics::describe_counter!("translation_translated_total", "Records moved to Translated.");
        metrics::describe_counter!(
            "translation_self_total",
            "Records already in the target language, copied as-is."
        );
        metrics::describe_counter!("translation_failed_total", "Failed translation attempts.");
        metrics::describe_counter!(
            "translation_batch_fallback_total",
            "Batch calls rejected and retried one string at a time."
        );
        metrics::describe_counter!("translation_requeued_total", "Failed records requeued.");
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub claimed: usize,
    pub translated: usize,
    pub self_translated: usize,
    pub failed: usize,
}

pub struct TranslationOrchestrator {
    store: Arc<dyn Store>,
    translator: DynTranslator,
    cfg: TranslationConfig,
    guard: RunGuard,
}

impl TranslationOrchestrator {
    pub fn new(store: Arc<dyn Store>, translator: DynTranslator, cfg: TranslationConfig) -> Self {
        ensure_metrics_described();
        Self {
            store,
            translator,
            cfg,
            guard: RunGuard::new(),
        }
    }

    pub fn translator_name(&self) -> &'static str {
        self.translator.name()
    }

    /// Claim up to `batch_size` pending records and drive each to a terminal
    /// state for this sweep. Translator errors never abort the sweep; only a
    /// store failure does.
    pub async fn run_sweep(&self) -> Result<SweepReport, PipelineError> {
        let _permit = self
            .guard
            .try_acquire()
            .ok_or(PipelineError::SweepInProgress)?;

        let claimed = self.store.claim_pending(self.cfg.batch_size)?;
        let mut report = SweepReport {
            claimed: claimed.len(),
            ..Default::default()
        };

        for rec in claimed {
            if !needs_translation(&rec.title, &rec.summary) {
                self.store.mark_translated(
                    rec.id,
                    &TranslatedFields {
                        title: rec.title.clone(),
                        summary: rec.summary.clone(),
                        body: self.cfg.translate_body.then(|| rec.body.clone()),
                    },
                )?;
                counter!("translation_self_total").increment(1);
                report.self_translated += 1;
                continue;
            }

            match self.translate_record(&rec).await {
                Ok(fields) => {
                    self.store.mark_translated(rec.id, &fields)?;
                    counter!("translation_translated_total").increment(1);
                    report.translated += 1;
                }
                Err(reason) => {
                    let retries = self
                        .store
                        .mark_translation_failed(rec.id, self.cfg.max_retries)?;
                    counter!("translation_failed_total").increment(1);
                    let err = PipelineError::TranslationFailed { id: rec.id, reason };
                    warn!(
                        target: "translate",
                        id = rec.id,
                        retries,
                        max_retries = self.cfg.max_retries,
                        error = %err,
                        "translation attempt failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.claimed > 0 {
            info!(
                target: "translate",
                provider = self.translator.name(),
                claimed = report.claimed,
                translated = report.translated,
                self_translated = report.self_translated,
                failed = report.failed,
                "translation sweep finished"
            );
        }
        Ok(report)
    }

    /// Reset `Failed` records below the retry ceiling to `Pending`.
    pub fn requeue_failed(&self) -> Result<usize, PipelineError> {
        let n = self.store.requeue_failed(self.cfg.max_retries)?;
        counter!("translation_requeued_total").increment(n as u64);
        if n > 0 {
            info!(target: "translate", requeued = n, "failed translations requeued");
        }
        Ok(n)
    }

    async fn translate_record(&self, rec: &NewsRecord) -> Result<TranslatedFields, TranslateError> {
        let mut texts = vec![rec.title.clone(), rec.summary.clone()];
        if self.cfg.translate_body {
            texts.push(rec.body.clone());
        }
        let out = self.translate_texts(&texts).await?;
        let mut it = out.into_iter();
        let (Some(title), Some(summary)) = (it.next(), it.next()) else {
            return Err(TranslateError::LengthMismatch {
                expected: texts.len(),
                got: 0,
            });
        };
        Ok(TranslatedFields {
            title,
            summary,
            body: it.next(),
        })
    }

    /// One call for the whole list; on call failure, length mismatch or an
    /// empty element, one call per string.
    async fn translate_texts(&self, texts: &[String]) -> Result<Vec<String>, TranslateError> {
        let target = self.cfg.target_lang.as_str();
        let batch_err = match self.translator.translate(texts, target).await {
            Ok(out) => match validate(texts.len(), out) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            },
            Err(e) => e,
        };
        if texts.len() == 1 {
            return Err(batch_err);
        }

        counter!("translation_batch_fallback_total").increment(1);
        debug!(target: "translate", error = %batch_err, "batch rejected; translating one string at a time");

        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let single = std::slice::from_ref(text);
            let res = self.translator.translate(single, target).await?;
            let mut v = validate(1, res)?;
            out.push(v.remove(0));
        }
        Ok(out)
    }
}

fn validate(expected: usize, out: Vec<String>) -> Result<Vec<String>, TranslateError> {
    if out.len() != expected {
        return Err(TranslateError::LengthMismatch {
            expected,
            got: out.len(),
        });
    }
    if out.iter().any(|s| s.trim().is_empty()) {
        return Err(TranslateError::Malformed("empty translated string".into()));
    }
    Ok(out.into_iter().map(|s| s.trim().to_string()).collect())
}
