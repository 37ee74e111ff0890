//! Full-bleed bitmap printing through the Windows GDI spooler
//!
//! The bitmap is center-cropped to the page aspect ratio and stretched to
//! the whole printable area (HORZRES x VERTRES), so nothing is letterboxed.
//! Other platforms get a printer that refuses to connect.

use image::RgbImage;
use tracing::{info, instrument};

use crate::error::{PrintError, PrintResult};
use crate::printer::{BitmapPrinter, PrintJob};

/// Windows driver printer
#[derive(Debug, Clone)]
pub struct GdiPrinter {
    printer: String,
}

impl GdiPrinter {
    /// Resolve the target printer once; the named one, else the default
    /// printer, else the first non-virtual printer
    pub fn connect(name: Option<&str>) -> PrintResult<Self> {
        let printer = platform::resolve_printer(name)?;
        info!(printer = %printer, "Using Windows printer");
        Ok(Self { printer })
    }
}

impl BitmapPrinter for GdiPrinter {
    fn target(&self) -> String {
        format!("gdi:{}", self.printer)
    }

    #[instrument(skip(self, bitmap), fields(printer = %self.printer, doc = %job.doc_name))]
    fn submit(&self, bitmap: &RgbImage, job: &PrintJob) -> PrintResult<()> {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(PrintError::InvalidBitmap("empty bitmap".to_string()));
        }
        platform::print_bitmap(&self.printer, bitmap, job)
    }
}

#[cfg(windows)]
mod platform {
    use std::alloc::{Layout, alloc_zeroed, dealloc};
    use std::mem::{align_of, size_of};
    use std::ptr::NonNull;

    use image::RgbImage;
    use tracing::debug;
    use windows::Win32::Foundation::GetLastError;
    use windows::Win32::Graphics::Gdi::{
        BI_RGB, BITMAPINFO, BITMAPINFOHEADER, CreateDCW, DEVMODEW, DIB_RGB_COLORS,
        DM_PAPERLENGTH, DM_PAPERSIZE, DM_PAPERWIDTH, DMPAPER_A4, DMPAPER_A5, DMPAPER_A6,
        DMPAPER_USER, DeleteDC, GetDeviceCaps, HALFTONE, HDC, HORZRES, SRCCOPY,
        SetStretchBltMode, StretchDIBits, VERTRES,
    };
    use windows::Win32::Graphics::Printing::{
        ClosePrinter, DocumentPropertiesW, OpenPrinterW, PRINTER_HANDLE,
    };
    use windows::Win32::Storage::Xps::DOCINFOW;
    use windows::core::{PCWSTR, PWSTR, w};

    use crate::bitmap::{crop_to_page, to_bgra};
    use crate::error::{PrintError, PrintResult};
    use crate::printer::{PaperSize, PrintJob, WindowsPrinter, to_wide};

    #[link(name = "gdi32")]
    unsafe extern "system" {
        fn AbortDoc(hdc: HDC) -> i32;
        fn EndDoc(hdc: HDC) -> i32;
        fn EndPage(hdc: HDC) -> i32;
        fn StartDocW(hdc: HDC, lpdi: *const DOCINFOW) -> i32;
        fn StartPage(hdc: HDC) -> i32;
    }

    pub fn resolve_printer(name: Option<&str>) -> PrintResult<String> {
        WindowsPrinter::resolve(name)
    }

    pub fn print_bitmap(printer: &str, bitmap: &RgbImage, job: &PrintJob) -> PrintResult<()> {
        if !WindowsPrinter::check_online(printer)? {
            return Err(PrintError::Offline(printer.to_string()));
        }

        let hdc = create_printer_dc(printer, job.paper)?;
        let doc_w = to_wide(&job.doc_name);

        unsafe {
            let _guard = HdcGuard(hdc);

            let page_w = GetDeviceCaps(Some(hdc), HORZRES).max(1);
            let page_h = GetDeviceCaps(Some(hdc), VERTRES).max(1);
            let cropped = crop_to_page(bitmap, page_w as u32, page_h as u32);
            let bgra = to_bgra(&cropped);
            debug!(
                page_w,
                page_h,
                src_w = cropped.width(),
                src_h = cropped.height(),
                "Page geometry"
            );

            let di = DOCINFOW {
                cbSize: size_of::<DOCINFOW>() as i32,
                lpszDocName: PCWSTR::from_raw(doc_w.as_ptr()),
                ..Default::default()
            };
            if StartDocW(hdc, &di) <= 0 {
                return Err(last_error("StartDoc"));
            }

            let mut doc = DocGuard { hdc, active: true };

            if StartPage(hdc) <= 0 {
                doc.abort();
                return Err(last_error("StartPage"));
            }

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: cropped.width() as i32,
                    biHeight: -(cropped.height() as i32),
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            SetStretchBltMode(hdc, HALFTONE);
            let r = StretchDIBits(
                hdc,
                0,
                0,
                page_w,
                page_h,
                0,
                0,
                cropped.width() as i32,
                cropped.height() as i32,
                Some(bgra.as_ptr() as *const _),
                &bmi,
                DIB_RGB_COLORS,
                SRCCOPY,
            );
            if r == 0 {
                doc.abort();
                return Err(last_error("StretchDIBits"));
            }

            if EndPage(hdc) <= 0 {
                doc.abort();
                return Err(last_error("EndPage"));
            }

            doc.end()
        }
    }

    /// Printer DC, with the paper size forced through DEVMODE when requested
    fn create_printer_dc(printer: &str, paper: Option<PaperSize>) -> PrintResult<HDC> {
        let mut printer_w = to_wide(printer);

        let Some(paper) = paper else {
            let hdc = unsafe {
                CreateDCW(
                    w!("WINSPOOL"),
                    PCWSTR::from_raw(printer_w.as_ptr()),
                    PCWSTR::null(),
                    None,
                )
            };
            if hdc.is_invalid() {
                return Err(last_error("CreateDC"));
            }
            return Ok(hdc);
        };

        unsafe {
            let mut hprinter = PRINTER_HANDLE::default();
            OpenPrinterW(PWSTR(printer_w.as_mut_ptr()), &mut hprinter, None)
                .map_err(|e| PrintError::WindowsPrinter(format!("OpenPrinter: {e}")))?;
            let _guard = PrinterGuard(hprinter);

            let needed =
                DocumentPropertiesW(None, hprinter, PWSTR(printer_w.as_mut_ptr()), None, None, 0);
            if needed <= 0 {
                return Err(last_error("DocumentProperties"));
            }

            let layout = Layout::from_size_align(needed as usize, align_of::<DEVMODEW>())
                .map_err(|e| PrintError::WindowsPrinter(format!("DEVMODE layout: {e}")))?;
            let ptr = NonNull::new(alloc_zeroed(layout))
                .ok_or_else(|| PrintError::WindowsPrinter("DEVMODE alloc failed".to_string()))?;
            let devmode = ptr.as_ptr() as *mut DEVMODEW;
            let buf = DevmodeBuf { ptr, layout };

            let r = DocumentPropertiesW(
                None,
                hprinter,
                PWSTR(printer_w.as_mut_ptr()),
                Some(devmode),
                None,
                2,
            );
            if r != 1 {
                return Err(last_error("DocumentProperties(out)"));
            }

            let fields = &mut (*devmode).Anonymous1.Anonymous1;
            match paper {
                PaperSize::A4 => fields.dmPaperSize = DMPAPER_A4 as i16,
                PaperSize::A5 => fields.dmPaperSize = DMPAPER_A5 as i16,
                PaperSize::A6 => fields.dmPaperSize = DMPAPER_A6 as i16,
                PaperSize::Custom {
                    width_mm,
                    height_mm,
                } => {
                    fields.dmPaperSize = DMPAPER_USER as i16;
                    fields.dmPaperWidth = (width_mm * 10.0).round() as i16;
                    fields.dmPaperLength = (height_mm * 10.0).round() as i16;
                    (*devmode).dmFields |= DM_PAPERWIDTH | DM_PAPERLENGTH;
                }
            }
            (*devmode).dmFields |= DM_PAPERSIZE;

            let r = DocumentPropertiesW(
                None,
                hprinter,
                PWSTR(printer_w.as_mut_ptr()),
                Some(devmode),
                Some(devmode),
                10,
            );
            if r != 1 {
                return Err(last_error("DocumentProperties(in)"));
            }

            let hdc = CreateDCW(
                w!("WINSPOOL"),
                PCWSTR::from_raw(printer_w.as_ptr()),
                PCWSTR::null(),
                Some(devmode as *const _),
            );
            drop(buf);

            if hdc.is_invalid() {
                return Err(last_error("CreateDC"));
            }
            Ok(hdc)
        }
    }

    struct DevmodeBuf {
        ptr: NonNull<u8>,
        layout: Layout,
    }

    impl Drop for DevmodeBuf {
        fn drop(&mut self) {
            unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
        }
    }

    struct HdcGuard(HDC);

    impl Drop for HdcGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = DeleteDC(self.0);
            }
        }
    }

    struct PrinterGuard(PRINTER_HANDLE);

    impl Drop for PrinterGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = ClosePrinter(self.0);
            }
        }
    }

    struct DocGuard {
        hdc: HDC,
        active: bool,
    }

    impl DocGuard {
        fn abort(&mut self) {
            if !self.active {
                return;
            }
            unsafe {
                let _ = AbortDoc(self.hdc);
            }
            self.active = false;
        }

        fn end(&mut self) -> PrintResult<()> {
            if !self.active {
                return Ok(());
            }
            let r = unsafe { EndDoc(self.hdc) };
            self.active = false;
            if r <= 0 {
                return Err(last_error("EndDoc"));
            }
            Ok(())
        }
    }

    impl Drop for DocGuard {
        fn drop(&mut self) {
            self.abort();
        }
    }

    fn last_error(call: &str) -> PrintError {
        let code = unsafe { GetLastError().0 };
        PrintError::WindowsPrinter(format!("{call} failed (win32 error {code})"))
    }
}

#[cfg(not(windows))]
mod platform {
    use image::RgbImage;

    use crate::error::{PrintError, PrintResult};
    use crate::printer::PrintJob;

    const UNSUPPORTED: &str = "GDI printing is only available on Windows";

    pub fn resolve_printer(_name: Option<&str>) -> PrintResult<String> {
        Err(PrintError::NotSupported(UNSUPPORTED.to_string()))
    }

    pub fn print_bitmap(_printer: &str, _bitmap: &RgbImage, _job: &PrintJob) -> PrintResult<()> {
        Err(PrintError::NotSupported(UNSUPPORTED.to_string()))
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn test_connect_unsupported_off_windows() {
        let result = GdiPrinter::connect(Some("Kiosk A5"));
        assert!(matches!(result, Err(PrintError::NotSupported(_))));
    }
}
