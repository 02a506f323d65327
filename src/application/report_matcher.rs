// Report matcher - finds an existing remote report for a set of keywords
use crate::application::psa_repository::{ApiResult, PsaRepository};
use crate::domain::matching::{is_exact_name_match, keyword_overlap};
use crate::domain::report::Report;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReportMatcher {
    repository: Arc<dyn PsaRepository>,
    page_size: usize,
    min_overlap: usize,
}

impl ReportMatcher {
    pub fn new(repository: Arc<dyn PsaRepository>, page_size: usize, min_overlap: usize) -> Self {
        Self {
            repository,
            page_size: page_size.max(1),
            min_overlap: min_overlap.max(1),
        }
    }

    /// `Ok(None)` means nothing cleared the overlap threshold.
    pub async fn find_matching_report(&self, keywords: &[String]) -> ApiResult<Option<Report>> {
        if keywords.is_empty() {
            return Ok(None);
        }
        let reports = self.repository.list_reports(None, self.page_size).await?;
        tracing::debug!("Scoring {} reports against {:?}", reports.len(), keywords);
        Ok(best_match(reports, keywords, self.min_overlap))
    }
}

/// Exact name matches score above any possible keyword overlap.
pub fn score_report(report: &Report, keywords: &[String]) -> usize {
    if is_exact_name_match(keywords, &report.name) {
        return keywords.len() + 1;
    }
    keyword_overlap(keywords, &format!("{} {}", report.name, report.description))
}

/// Highest score at or above the threshold; ties go to the most recently modified.
pub fn best_match(reports: Vec<Report>, keywords: &[String], min_overlap: usize) -> Option<Report> {
    let threshold = min_overlap.min(keywords.len()).max(1);
    reports
        .into_iter()
        .map(|r| (score_report(&r, keywords), r))
        .filter(|(score, _)| *score >= threshold)
        .reduce(|best, candidate| {
            let better = candidate.0 > best.0
                || (candidate.0 == best.0 && candidate.1.last_modified > best.1.last_modified);
            if better { candidate } else { best }
        })
        .map(|(_, report)| report)
}
