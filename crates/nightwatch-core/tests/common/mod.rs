use std::cell::{Cell, RefCell};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use nightwatch_core::clock::Clock;
use nightwatch_core::config::{LayoutConfig, NightwatchConfig, RegionOfInterest};
use nightwatch_core::error::{NightwatchError, Result};
use nightwatch_core::fits::{Header, Value};
use nightwatch_core::frame::Frame;
use nightwatch_core::layout::{AggregatePaths, NightLayout};
use nightwatch_core::metadata::HeaderOverlay;
use nightwatch_core::monitor::{DispatchOutcome, FrameRunner};
use nightwatch_core::processor::{
    CropBox, ExtractionParams, ImageProcessor, RenderRequest, SolveHint, Source,
};

pub const NIGHT: &str = "2013-08-05";

// ---------------------------------------------------------------------------
// Night directory builder
// ---------------------------------------------------------------------------

/// A scratch data root with one night's directories and a config pointing
/// every output location inside it.
pub struct NightBuilder {
    pub root: TempDir,
    pub config: NightwatchConfig,
    pub layout: NightLayout,
}

impl NightBuilder {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let base = root.path();
        let mut config = NightwatchConfig::default();
        config.layout = LayoutConfig {
            data_root: base.join("data"),
            logs_dir: base.join("logs"),
            plots_dir: base.join("plots"),
            tmp_dir: base.join("tmp"),
            ..LayoutConfig::default()
        };
        config.monitor.metadata_retry_secs = vec![0, 10, 20];
        let layout = NightLayout::new(&config.layout, NIGHT);
        fs::create_dir_all(&layout.raw_dir).unwrap();
        fs::create_dir_all(&layout.metadata_dir).unwrap();
        Self {
            root,
            config,
            layout,
        }
    }

    pub fn frame_name(index: u32) -> String {
        format!("IMG0_{index:04}.CR2")
    }

    /// Write a raw frame file and, when `imtype` is given, its sidecar.
    pub fn add_frame(&self, index: u32, imtype: Option<&str>) -> PathBuf {
        let path = self.layout.raw_dir.join(Self::frame_name(index));
        fs::write(&path, b"raw bytes").unwrap();
        if let Some(imtype) = imtype {
            self.write_sidecar(index, &full_sidecar(imtype));
        }
        path
    }

    pub fn write_sidecar(&self, index: u32, text: &str) {
        let path = self.layout.sidecar_for(&format!("IMG0_{index:04}"));
        fs::write(path, text).unwrap();
    }

    pub fn frame(&self, index: u32) -> Frame {
        let path = self.layout.raw_dir.join(Self::frame_name(index));
        Frame::from_path(&path, Utc::now()).unwrap()
    }

    pub fn aggregates(&self) -> AggregatePaths {
        AggregatePaths::new(&self.config.layout, &self.config.telescope, NIGHT)
    }

    /// Run `f` with events appended to the night log, as the CLI does.
    pub fn with_night_log<T>(&self, f: impl FnOnce() -> T) -> T {
        let log = self.aggregates().log;
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log)
                    .unwrap()
            })
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    /// Data lines of the summary file (header excluded).
    pub fn summary_rows(&self) -> Vec<String> {
        match fs::read_to_string(self.aggregates().summary) {
            Ok(text) => text
                .lines()
                .filter(|l| !l.starts_with('#'))
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn html_rows(&self) -> usize {
        fs::read_to_string(self.aggregates().html)
            .map(|t| t.matches("<tr><td").count())
            .unwrap_or(0)
    }

    /// Files left in the scratch root.
    pub fn tmp_entries(&self) -> usize {
        fs::read_dir(&self.config.layout.tmp_dir)
            .map(|d| d.count())
            .unwrap_or(0)
    }
}

pub fn full_sidecar(imtype: &str) -> String {
    format!(
        "TARGET: Field 12\nEXPTIME: 60.0 s\nRA: 150.0 deg\nDEC: 20.0 deg\nUT START: 10.75 hours\nIMTYPE: {imtype}\n"
    )
}

/// Value of `column` in a tab-separated summary row, using the full default
/// column order.
pub fn summary_cell(row: &str, column: nightwatch_core::pipeline::RowField) -> String {
    let index = nightwatch_core::pipeline::RowField::ALL
        .iter()
        .position(|f| *f == column)
        .unwrap();
    row.split('\t').nth(index).unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Fake image processor
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SolveBehaviour {
    Solves,
    NoSolution,
    ToolFails,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExtractBehaviour {
    Finds,
    Garbled,
    ToolFails,
}

/// In-memory processor: the header lives in a `RefCell`, and only
/// placeholder files are written into the scratch directory.
pub struct FakeProcessor {
    pub fail_acquire: bool,
    pub solve: SolveBehaviour,
    pub extract: ExtractBehaviour,
    pub header: RefCell<Header>,
    pub overlays: RefCell<Vec<HeaderOverlay>>,
    pub calls: RefCell<Vec<&'static str>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self {
            fail_acquire: false,
            solve: SolveBehaviour::Solves,
            extract: ExtractBehaviour::Finds,
            header: RefCell::new(Header::new()),
            overlays: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn call(&self, name: &'static str) {
        self.calls.borrow_mut().push(name);
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|c| *c == name)
    }
}

fn tool_failure(tool: &str) -> NightwatchError {
    NightwatchError::ExternalTool {
        tool: tool.into(),
        status: "exit status: 1".into(),
        output: "simulated".into(),
    }
}

impl ImageProcessor for FakeProcessor {
    fn acquire(&self, frame: &Frame, workdir: &Path) -> Result<PathBuf> {
        self.call("acquire");
        // Leave a partial file behind as a real converter would.
        fs::write(workdir.join(format!("{}.ppm", frame.basename)), b"partial")?;
        if self.fail_acquire {
            return Err(tool_failure("dcraw"));
        }
        let working = workdir.join(format!("{}.fits", frame.basename));
        fs::write(&working, b"fits")?;
        let mut header = Header::new();
        header.set("NAXIS1", Value::Int(4096));
        header.set("NAXIS2", Value::Int(4096));
        *self.header.borrow_mut() = header;
        Ok(working)
    }

    fn read_header(&self, _image: &Path) -> Result<Header> {
        Ok(self.header.borrow().clone())
    }

    fn merge_header(&self, _image: &Path, overlay: &HeaderOverlay) -> Result<()> {
        self.call("merge_header");
        overlay.apply(&mut self.header.borrow_mut());
        self.overlays.borrow_mut().push(overlay.clone());
        Ok(())
    }

    fn solve_astrometry(&self, _image: &Path, hint: &SolveHint) -> Result<bool> {
        self.call("solve");
        match self.solve {
            SolveBehaviour::Solves => {
                let target = hint.target.map(|t| (t.ra_deg, t.dec_deg)).unwrap_or((0.0, 0.0));
                let mut h = self.header.borrow_mut();
                h.set("CTYPE1", Value::Str("RA---TAN".into()));
                h.set("CTYPE2", Value::Str("DEC--TAN".into()));
                h.set("CRVAL1", Value::Float(target.0));
                // Solved 0.1 degree north of the commanded position.
                h.set("CRVAL2", Value::Float(target.1 + 0.1));
                h.set("CRPIX1", Value::Float(2048.5));
                h.set("CRPIX2", Value::Float(2048.5));
                h.set("CD1_1", Value::Float(-hint.pixel_scale / 3600.0));
                h.set("CD1_2", Value::Float(0.0));
                h.set("CD2_1", Value::Float(0.0));
                h.set("CD2_2", Value::Float(hint.pixel_scale / 3600.0));
                Ok(true)
            }
            SolveBehaviour::NoSolution => Ok(false),
            SolveBehaviour::ToolFails => Err(tool_failure("solve-field")),
        }
    }

    fn subtract_dark(&self, _image: &Path, _darks: &[PathBuf]) -> Result<()> {
        self.call("subtract_dark");
        Ok(())
    }

    fn crop(&self, _image: &Path, roi: &RegionOfInterest, output: &Path) -> Result<Option<CropBox>> {
        self.call("crop");
        fs::write(output, b"crop")?;
        Ok(roi.pixel_box(4096, 4096))
    }

    fn extract_sources(&self, _image: &Path, _params: &ExtractionParams) -> Result<Vec<Source>> {
        self.call("extract");
        match self.extract {
            ExtractBehaviour::Finds => Ok((0..5)
                .map(|i| Source {
                    x: 100.0 + i as f64,
                    y: 200.0,
                    fwhm_pix: 2.0 + i as f64 * 0.5,
                    ellipticity: 0.1,
                    background: 1000.0,
                    flags: 0,
                })
                .collect()),
            ExtractBehaviour::Garbled => Err(NightwatchError::InvalidCatalog("garbled".into())),
            ExtractBehaviour::ToolFails => Err(tool_failure("sex")),
        }
    }

    fn render_jpeg(&self, request: &RenderRequest) -> Result<PathBuf> {
        self.call("render");
        Ok(request.output.clone())
    }
}

// ---------------------------------------------------------------------------
// Recording frame runner
// ---------------------------------------------------------------------------

/// Records every dispatch and answers with a fixed outcome.
pub struct RecordingRunner {
    pub calls: Vec<(String, bool)>,
    pub outcome: DispatchOutcome,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            outcome: DispatchOutcome::Succeeded,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.calls.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl FrameRunner for RecordingRunner {
    fn run(&mut self, frame: &Frame, clobber: bool) -> DispatchOutcome {
        self.calls.push((frame.basename.clone(), clobber));
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// Fake clock
// ---------------------------------------------------------------------------

type SleepHook = Box<dyn FnMut(Duration, DateTime<Utc>)>;

/// Clock whose `sleep` advances time instantly and optionally runs a hook,
/// letting tests change the filesystem "while" the code under test waits.
pub struct FakeClock {
    now: Cell<DateTime<Utc>>,
    pub slept: RefCell<Vec<Duration>>,
    hook: RefCell<Option<SleepHook>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Utc.with_ymd_and_hms(2013, 8, 6, 6, 0, 0).unwrap()),
            slept: RefCell::new(Vec::new()),
            hook: RefCell::new(None),
        }
    }

    pub fn on_sleep(&self, hook: impl FnMut(Duration, DateTime<Utc>) + 'static) {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }

    pub fn total_slept(&self) -> Duration {
        self.slept.borrow().iter().sum()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
        let now = self.now.get() + chrono::Duration::from_std(duration).unwrap();
        self.now.set(now);
        if let Some(hook) = self.hook.borrow_mut().as_mut() {
            hook(duration, now);
        }
    }
}
