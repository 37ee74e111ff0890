//! Printer adapters for submitting bitmaps
//!
//! Supports:
//! - Windows driver printers (GDI, full-bleed), see [`crate::gdi`]
//! - Preview output (PNG files in a directory, no paper used)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::RgbImage;
use tracing::{info, instrument};

use crate::error::{PrintError, PrintResult};

/// Trait for bitmap printer adapters
///
/// `submit` blocks until the spooler (or file system) accepted the job.
pub trait BitmapPrinter: Send + Sync {
    /// Human readable target, for logs
    fn target(&self) -> String;

    /// Submit one opaque bitmap as a single-page document
    fn submit(&self, bitmap: &RgbImage, job: &PrintJob) -> PrintResult<()>;
}

/// Paper size requested from the driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaperSize {
    A4,
    A5,
    A6,
    Custom { width_mm: f32, height_mm: f32 },
}

impl PaperSize {
    /// Portrait width and height in millimetres
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::A6 => (105.0, 148.0),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A4 => f.write_str("a4"),
            Self::A5 => f.write_str("a5"),
            Self::A6 => f.write_str("a6"),
            Self::Custom {
                width_mm,
                height_mm,
            } => write!(f, "{width_mm}x{height_mm}mm"),
        }
    }
}

impl FromStr for PaperSize {
    type Err = PrintError;

    /// `a4`, `a5`, `a6` or `<width>x<height>mm`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "a4" => return Ok(Self::A4),
            "a5" => return Ok(Self::A5),
            "a6" => return Ok(Self::A6),
            _ => {}
        }

        let dims = lower.strip_suffix("mm").unwrap_or(&lower);
        let invalid = || PrintError::InvalidConfig(format!("Invalid paper size: {s}"));
        let (w, h) = dims.split_once('x').ok_or_else(invalid)?;
        let width_mm: f32 = w.trim().parse().map_err(|_| invalid())?;
        let height_mm: f32 = h.trim().parse().map_err(|_| invalid())?;

        if !(width_mm > 0.0 && height_mm > 0.0 && width_mm.is_finite() && height_mm.is_finite()) {
            return Err(invalid());
        }

        Ok(Self::Custom {
            width_mm,
            height_mm,
        })
    }
}

/// Per-document options
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    /// Spooler document name; also the preview file stem
    pub doc_name: String,
    /// Paper override, driver default when `None`
    pub paper: Option<PaperSize>,
}

impl PrintJob {
    pub fn new(doc_name: impl Into<String>) -> Self {
        Self {
            doc_name: doc_name.into(),
            paper: None,
        }
    }

    pub fn with_paper(mut self, paper: Option<PaperSize>) -> Self {
        self.paper = paper;
        self
    }
}

/// Writes each submitted bitmap as a PNG instead of printing it
#[derive(Debug, Clone)]
pub struct PreviewPrinter {
    dir: PathBuf,
}

impl PreviewPrinter {
    /// Create a preview printer, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> PrintResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<stem>_<YYYYmmdd_HHMMSS>.png`, with a counter on collision
    fn preview_path(&self, doc_name: &str) -> PathBuf {
        let stem = Path::new(doc_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "preview".to_string());
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

        let mut path = self.dir.join(format!("{stem}_{stamp}.png"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{stem}_{stamp}_{n}.png"));
            n += 1;
        }
        path
    }
}

impl BitmapPrinter for PreviewPrinter {
    fn target(&self) -> String {
        format!("preview:{}", self.dir.display())
    }

    #[instrument(skip(self, bitmap), fields(doc = %job.doc_name))]
    fn submit(&self, bitmap: &RgbImage, job: &PrintJob) -> PrintResult<()> {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(PrintError::InvalidBitmap("empty bitmap".to_string()));
        }
        let path = self.preview_path(&job.doc_name);
        bitmap.save(&path)?;
        info!(path = %path.display(), "Preview saved");
        Ok(())
    }
}

/// Windows driver printer lookup
///
/// Uses Win32 API to enumerate installed printer drivers.
#[cfg(windows)]
pub struct WindowsPrinter;

#[cfg(windows)]
impl WindowsPrinter {
    /// Installed printers, virtual ones (PDF, XPS, OneNote) excluded
    pub fn list() -> PrintResult<Vec<String>> {
        Ok(Self::installed()?
            .into_iter()
            .filter(|(_, port)| !is_virtual_port(port))
            .map(|(name, _)| name)
            .collect())
    }

    /// Every local and connected printer as `(name, port)`
    fn installed() -> PrintResult<Vec<(String, String)>> {
        use windows::Win32::Graphics::Printing::{
            EnumPrintersW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL, PRINTER_INFO_5W,
        };
        use windows::core::PWSTR;

        let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
        let mut size: u32 = 0;
        let mut count: u32 = 0;

        unsafe {
            // First call only reports the buffer size
            let _ = EnumPrintersW(flags, None, 5, None, &mut size, &mut count);
            if size == 0 {
                return Ok(Vec::new());
            }

            let mut info_buf = vec![0u8; size as usize];
            EnumPrintersW(flags, None, 5, Some(info_buf.as_mut_slice()), &mut size, &mut count)
                .map_err(|e| PrintError::WindowsPrinter(format!("EnumPrinters: {e}")))?;

            let infos = std::slice::from_raw_parts(
                info_buf.as_ptr() as *const PRINTER_INFO_5W,
                count as usize,
            );
            let wide = |p: PWSTR| {
                if p.is_null() {
                    String::new()
                } else {
                    p.to_string().unwrap_or_default()
                }
            };

            Ok(infos
                .iter()
                .filter(|info| !info.pPrinterName.is_null())
                .map(|info| (wide(info.pPrinterName), wide(info.pPortName)))
                .collect())
        }
    }

    /// Get the default printer name
    pub fn default_printer() -> PrintResult<Option<String>> {
        use windows::Win32::Graphics::Printing::GetDefaultPrinterW;
        use windows::core::PWSTR;

        unsafe {
            let mut needed: u32 = 0;
            let _ = GetDefaultPrinterW(None, &mut needed);

            if needed == 0 {
                return Ok(None);
            }

            let mut buf: Vec<u16> = vec![0; needed as usize];
            let ok = GetDefaultPrinterW(Some(PWSTR(buf.as_mut_ptr())), &mut needed);

            if !ok.as_bool() {
                return Ok(None);
            }

            let name = PWSTR(buf.as_mut_ptr())
                .to_string()
                .map_err(|e| PrintError::WindowsPrinter(format!("UTF-16 decode failed: {}", e)))?;

            Ok(Some(name))
        }
    }

    /// Resolve a printer name - the named printer if installed, else the
    /// default printer, else the first available one
    pub fn resolve(name: Option<&str>) -> PrintResult<String> {
        if let Some(name) = name {
            let printers = Self::list()?;
            if printers.iter().any(|p| p == name) {
                return Ok(name.to_string());
            }
            return Err(PrintError::WindowsPrinter(format!(
                "Printer not found: {}",
                name
            )));
        }

        if let Some(default) = Self::default_printer()? {
            return Ok(default);
        }

        let printers = Self::list()?;
        printers
            .first()
            .cloned()
            .ok_or_else(|| PrintError::WindowsPrinter("No printers available".to_string()))
    }

    /// Check the spooler's offline flag for a printer
    pub fn check_online(name: &str) -> PrintResult<bool> {
        use windows::Win32::Graphics::Printing::{
            ClosePrinter, GetPrinterW, OpenPrinterW, PRINTER_HANDLE, PRINTER_INFO_6,
            PRINTER_STATUS_OFFLINE,
        };
        use windows::core::PCWSTR;

        unsafe {
            let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
            let name_w = to_wide(name);

            OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
                .map_err(|_| PrintError::WindowsPrinter("OpenPrinterW failed".to_string()))?;

            let mut online = true;
            let mut needed: u32 = 0;
            let _ = GetPrinterW(handle, 6, None, &mut needed);

            if needed > 0 {
                let mut buf: Vec<u8> = vec![0; needed as usize];
                if GetPrinterW(handle, 6, Some(buf.as_mut_slice()), &mut needed).is_ok() {
                    let info = *(buf.as_ptr() as *const PRINTER_INFO_6);
                    online = (info.dwStatus & PRINTER_STATUS_OFFLINE) == 0;
                }
            }

            let _ = ClosePrinter(handle);
            Ok(online)
        }
    }
}

/// Check if a port belongs to a virtual printer (PDF, XPS, OneNote, ...)
pub fn is_virtual_port(port: &str) -> bool {
    let p = port.to_lowercase();
    p == "file:"
        || p == "portprompt:"
        || p == "xpsport:"
        || p.starts_with("onenote")
        || p == "nul:"
        || p.starts_with("wfsport:")
}

#[cfg(windows)]
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
