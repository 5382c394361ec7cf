//! Text rendering of the view model.
//!
//! Only what changed since the previous frame is printed, so the output reads
//! like a transcript of the session.
use std::io::{self, Write};

use attendance_core::{
    AppViewModel, FileRowView, FolderView, LogCategory, ProgressView, RecordRowView, Toast,
    ToastKind,
};
use chrono::Local;

const BAR_WIDTH: usize = 30;

pub struct Renderer<W: Write> {
    out: W,
    last: AppViewModel,
    log_seen: usize,
    log_run: u64,
    first_frame: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last: AppViewModel::default(),
            log_seen: 0,
            log_run: 0,
            first_frame: true,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn toast(&mut self, toast: &Toast) -> io::Result<()> {
        let marker = match toast.kind {
            ToastKind::Info => "info",
            ToastKind::Success => " ok ",
            ToastKind::Warning => "warn",
            ToastKind::Error => "FAIL",
        };
        writeln!(self.out, "[{marker}] {}", toast.text)
    }

    pub fn render(&mut self, view: &AppViewModel) -> io::Result<()> {
        if self.first_frame || view.tab != self.last.tab {
            writeln!(self.out, "== {} ==", view.page_title)?;
        }

        // A new analysis starts the log over.
        if view.log_run != self.log_run {
            self.log_run = view.log_run;
            self.log_seen = 0;
        }
        for event in &view.log[self.log_seen..] {
            let stamp = Local::now().format("%H:%M:%S");
            writeln!(
                self.out,
                "{stamp} {:<7} {}",
                category_label(&event.category),
                event.message
            )?;
        }
        self.log_seen = view.log.len();

        if view.analysis_progress != self.last.analysis_progress {
            if let Some(progress) = &view.analysis_progress {
                self.progress(progress)?;
            }
        }
        if view.stats != self.last.stats || view.records != self.last.records {
            if let Some(stats) = &view.stats {
                writeln!(
                    self.out,
                    "Persons: {} | Missing: {} | With issues: {} | Matched images: {}",
                    stats.total_persons,
                    stats.total_missing,
                    stats.persons_with_issues,
                    stats.total_matched
                )?;
                self.records(&view.records)?;
            }
        }

        if view.selected_pdf != self.last.selected_pdf {
            if let Some(selected) = &view.selected_pdf {
                writeln!(self.out, "Selected PDF: {selected}")?;
            }
        }
        if view.pdf_progress != self.last.pdf_progress {
            if let Some(progress) = &view.pdf_progress {
                self.progress(progress)?;
            }
        }
        if view.created_files != self.last.created_files && !view.created_files.is_empty() {
            writeln!(self.out, "Created files:")?;
            for file in &view.created_files {
                match file.page {
                    Some(page) => writeln!(self.out, "  {} (page {page})", file.name)?,
                    None => writeln!(self.out, "  {}", file.name)?,
                }
            }
        }

        if view.result_files != self.last.result_files {
            self.files("Result files", &view.result_files)?;
        }
        if view.pdf_uploads != self.last.pdf_uploads {
            self.files("Uploaded PDFs", &view.pdf_uploads)?;
        }
        if view.extracted_folders != self.last.extracted_folders {
            self.folders(&view.extracted_folders)?;
        }

        self.out.flush()?;
        self.last = view.clone();
        self.first_frame = false;
        Ok(())
    }

    fn progress(&mut self, progress: &ProgressView) -> io::Result<()> {
        let filled = BAR_WIDTH * usize::from(progress.percent.min(100)) / 100;
        write!(
            self.out,
            "[{}{}] {:>3}% {}",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            progress.percent,
            progress.title
        )?;
        match &progress.detail {
            Some(detail) => writeln!(self.out, " ({detail})"),
            None => writeln!(self.out),
        }
    }

    fn records(&mut self, records: &[RecordRowView]) -> io::Result<()> {
        if records.is_empty() {
            return writeln!(self.out, "No missing records.");
        }
        writeln!(
            self.out,
            "{:>4}  {:<24} {:<12} {:<10} {:<30} {}",
            "#", "Name", "Date", "Weekday", "Issue", "Image"
        )?;
        for row in records {
            writeln!(
                self.out,
                "{:>4}  {:<24} {:<12} {:<10} {:<30} {}",
                row.index,
                row.person_name,
                row.date,
                row.weekday,
                row.issue,
                row.matched_image.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }

    fn files(&mut self, heading: &str, files: &[FileRowView]) -> io::Result<()> {
        writeln!(self.out, "{heading}:")?;
        if files.is_empty() {
            return writeln!(self.out, "  (none)");
        }
        for file in files {
            writeln!(self.out, "  {:>3}. {:<40} {:>10}", file.index, file.name, file.size)?;
        }
        Ok(())
    }

    fn folders(&mut self, folders: &[FolderView]) -> io::Result<()> {
        writeln!(self.out, "Extracted documents:")?;
        if folders.is_empty() {
            return writeln!(self.out, "  (none)");
        }
        for folder in folders {
            writeln!(self.out, "  {}/ ({} files)", folder.folder, folder.count)?;
            for file in &folder.files {
                writeln!(self.out, "    {:<38} {:>10}", file.name, file.size)?;
            }
        }
        Ok(())
    }
}

fn category_label(category: &LogCategory) -> &str {
    match category {
        LogCategory::Default => "",
        other => other.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_core::{AnalysisStats, LogEvent, Tab};

    fn rendered(frames: &[AppViewModel]) -> String {
        let mut renderer = Renderer::new(Vec::new());
        for frame in frames {
            renderer.render(frame).unwrap();
        }
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn view(tab: Tab) -> AppViewModel {
        AppViewModel {
            tab,
            page_title: tab.title(),
            ..AppViewModel::default()
        }
    }

    #[test]
    fn log_lines_are_printed_once() {
        let mut first = view(Tab::Analyze);
        first.log = vec![LogEvent::info("Starting analysis...")];
        let mut second = first.clone();
        second.log.push(LogEvent::new(LogCategory::Success, "Done"));

        let text = rendered(&[first, second]);
        assert_eq!(text.matches("Starting analysis...").count(), 1);
        assert!(text.contains("success Done"));
        assert_eq!(text.matches("== Attendance Analysis ==").count(), 1);
    }

    #[test]
    fn second_run_prints_its_whole_log_even_when_longer() {
        let mut first = view(Tab::Analyze);
        first.log_run = 1;
        first.log = vec![
            LogEvent::info("run one a"),
            LogEvent::info("run one b"),
        ];
        let mut second = view(Tab::Analyze);
        second.log_run = 2;
        second.log = vec![
            LogEvent::info("run two a"),
            LogEvent::info("run two b"),
            LogEvent::info("run two c"),
        ];

        let text = rendered(&[first, second]);
        for line in ["run two a", "run two b", "run two c"] {
            assert_eq!(text.matches(line).count(), 1, "{line} missing in {text}");
        }
    }

    #[test]
    fn stats_and_rows_follow_the_report() {
        let mut frame = view(Tab::Analyze);
        frame.stats = Some(AnalysisStats {
            total_persons: 4,
            total_missing: 5,
            persons_with_issues: 2,
            total_matched: 3,
        });
        frame.records = vec![RecordRowView {
            index: 1,
            person_name: "An".into(),
            date: "2024-03-04".into(),
            weekday: "Monday".into(),
            issue: "Missing check-in".into(),
            matched_image: None,
        }];

        let text = rendered(&[frame]);
        assert!(text.contains("Missing: 5"));
        assert!(text.contains("Matched images: 3"));
        assert!(text.contains("Missing check-in"));
    }

    #[test]
    fn progress_bar_shows_page_detail() {
        let mut frame = view(Tab::Pdf);
        frame.pdf_progress = Some(ProgressView {
            title: "Processing page 2".into(),
            percent: 40,
            detail: Some("Page 2/5".into()),
        });

        let text = rendered(&[frame]);
        assert!(text.contains(&format!("[{}{}]", "#".repeat(12), "-".repeat(18))));
        assert!(text.contains(" 40% Processing page 2 (Page 2/5)"));
    }

    #[test]
    fn toasts_are_tagged_by_kind() {
        let mut renderer = Renderer::new(Vec::new());
        renderer
            .toast(&Toast {
                kind: ToastKind::Error,
                text: "Error: broken".into(),
            })
            .unwrap();
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(text, "[FAIL] Error: broken\n");
    }
}
