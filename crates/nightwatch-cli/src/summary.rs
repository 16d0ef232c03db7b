use console::Style;
use nightwatch_core::batch::NightSummary;
use nightwatch_core::config::NightwatchConfig;
use nightwatch_core::layout::{AggregatePaths, NightLayout};
use nightwatch_core::monitor::MonitorSummary;
use nightwatch_core::pipeline::{FrameReport, RowField};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    warn: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            warn: Style::new().yellow(),
            path: Style::new().underlined(),
        }
    }

    fn row(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<14}{}", self.label.apply_to(label), self.value.apply_to(value));
    }

    fn path_row(&self, label: &str, path: &std::path::Path) {
        println!("  {:<14}{}", self.label.apply_to(label), self.path.apply_to(path.display()));
    }
}

pub fn print_config_summary(config: &NightwatchConfig, title: &str, night: &str, clobber: bool) {
    let s = Styles::new();
    let layout = NightLayout::new(&config.layout, night);
    let aggregates = AggregatePaths::new(&config.layout, &config.telescope, night);
    let t = &config.telescope;

    println!();
    println!("  {}", s.title.apply_to(title));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(title.chars().count())));
    println!();

    s.row("Night", night);
    s.path_row("Raw frames", &layout.raw_dir);
    s.path_row("Metadata", &layout.metadata_dir);
    s.path_row("Table", &aggregates.html);
    s.path_row("Summary", &aggregates.summary);
    if clobber {
        println!("  {:<14}{}", s.label.apply_to("Clobber"), s.warn.apply_to("existing rows will be removed"));
    }
    println!();

    println!("  {}", s.header.apply_to("Telescope"));
    s.row("Name", &t.long_name);
    s.row("Scale", format!("{:.2}\"/pix  f/{:.1}", t.pixel_scale(), t.f_ratio()));
    s.row("Region", &t.roi);
    s.row(
        "Thresholds",
        format!(
            "FWHM {} pix, ellipticity {}, pointing {}'",
            t.threshold_fwhm_pix, t.threshold_ellipticity, t.threshold_pointing_arcmin
        ),
    );
    println!();

    println!("  {}", s.header.apply_to("Site"));
    s.row("Name", &config.site.name);
    s.row(
        "Location",
        format!(
            "{:.4}, {:.4}, {:.0} m",
            config.site.latitude, config.site.longitude, config.site.altitude
        ),
    );
    println!();

    let m = &config.monitor;
    println!("  {}", s.header.apply_to("Timing"));
    s.row("Poll", format!("{} s, settle {} s", m.poll_interval_secs, m.settle_interval_secs));
    s.row("Metadata", format!("retry after {:?} s", m.metadata_retry_secs));
    s.row("Dispatch", format!("{} s limit, night ends {:02}:00", m.dispatch_timeout_secs, m.cutoff_hour));
    println!();
}

pub fn print_frame_report(report: &FrameReport, marker: &str) {
    let s = Styles::new();
    let m = &report.measurements;
    let cell = |field| m.cell(field).unwrap_or_else(|| marker.to_string());

    println!("  {}", s.title.apply_to(&m.file_name));
    for field in [
        RowField::Target,
        RowField::Fwhm,
        RowField::Ellipticity,
        RowField::StarCount,
        RowField::PointingError,
        RowField::Airmass,
    ] {
        s.row(&field.to_string(), cell(field));
    }
    for issue in &report.issues {
        println!(
            "  {:<14}{}",
            s.label.apply_to(issue.stage.to_string()),
            s.warn.apply_to(&issue.message)
        );
    }
    for jpeg in &report.jpegs {
        s.path_row("JPEG", jpeg);
    }
    s.row("Elapsed", format!("{:.1} s", report.elapsed.as_secs_f64()));
}

pub fn print_night_summary(summary: &NightSummary) {
    let s = Styles::new();
    println!();
    s.row("Frames", summary.frames);
    s.row("Measured", summary.succeeded());
    s.row("Skipped", summary.skipped);
    if summary.failed + summary.timed_out > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Failed"),
            s.warn.apply_to(format!("{} ({} timed out)", summary.failed + summary.timed_out, summary.timed_out))
        );
    }
}

pub fn print_monitor_summary(summary: &MonitorSummary) {
    let s = Styles::new();
    println!();
    s.row("Polls", summary.ticks);
    s.row("New frames", summary.new_frames);
    s.row("Measured", summary.succeeded);
    s.row("Skipped", summary.skipped);
    if summary.failed + summary.timed_out > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Failed"),
            s.warn.apply_to(format!("{} ({} timed out)", summary.failed + summary.timed_out, summary.timed_out))
        );
    }
}
