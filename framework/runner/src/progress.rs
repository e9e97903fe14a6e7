use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar counting finished executions.
///
/// Hidden when disabled, which is recommended for CI where nobody is looking at it.
pub(crate) fn start_progress(total_executions: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total_executions);
    match ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} executions [{elapsed_precise}] {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Falling back to the default progress style: {:?}", e),
    }

    pb
}
