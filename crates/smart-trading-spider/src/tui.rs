use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress of a batch: tickers handled, and how many of them succeeded or failed.
///
/// Without a tui every bar is hidden, so callers update it unconditionally.
pub(crate) struct Progress {
    multi: Option<MultiProgress>,
    pub(crate) total: ProgressBar,
    pub(crate) success: ProgressBar,
    pub(crate) fails: ProgressBar,
}

impl Progress {
    pub(crate) fn hidden() -> Self {
        Self {
            multi: None,
            total: ProgressBar::hidden(),
            success: ProgressBar::hidden(),
            fails: ProgressBar::hidden(),
        }
    }

    /// A transient spinner under the bars, e.g. while sleeping between chunks.
    pub(crate) fn spinner(&self, msg: String) -> ProgressBar {
        match &self.multi {
            Some(m) => {
                let spinner = m.add(
                    ProgressBar::new_spinner().with_message(msg).with_style(
                        ProgressStyle::default_spinner()
                            .template("\t   > {spinner:.magenta} {msg}")
                            .expect("failed to set spinner style"),
                    ),
                );
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner
            }
            None => ProgressBar::hidden(),
        }
    }

    pub(crate) fn finish(&self) {
        self.total.finish_and_clear();
        self.success.finish_and_clear();
        self.fails.finish_and_clear();
    }
}

pub(crate) fn multi_progress(len: usize, tui: bool) -> anyhow::Result<Progress> {
    if !tui {
        return Ok(Progress::hidden());
    }

    // overall multi progress bar
    let multi = MultiProgress::new();

    // total number of tickers to collect
    let total = multi.add(
        ProgressBar::new(len as u64).with_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.magenta}\n \
                        {msg:>9.white} |{bar:57.white/grey}| {pos:<2} / {human_len} \
                        ({percent_precise}%) [Time: {elapsed}, Rate: {per_sec}, ETA: {eta}]",
                )?
                .progress_chars("## "),
        ),
    );
    total.set_message("total");
    total.enable_steady_tick(Duration::from_millis(100));

    // total successful collections
    let success = multi.insert_after(
        &total,
        ProgressBar::new(len as u64).with_style(
            ProgressStyle::default_bar()
                .template(" {msg:>9.green} |{bar:57.green}| {pos:<2.green}")?
                .progress_chars("## "),
        ),
    );
    success.set_message("successes");

    // total failed collections
    let fails = multi.insert_after(
        &success,
        ProgressBar::new(len as u64).with_style(
            ProgressStyle::default_bar()
                .template(" {msg:>9.red} |{bar:57.red}| {pos:<2.red}")?
                .progress_chars("## "),
        ),
    );
    fails.set_message("failures");

    Ok(Progress {
        multi: Some(multi),
        total,
        success,
        fails,
    })
}
