//! Music-sheet preview thumbnails.
//!
//! PDF sheets have their first page rasterized by poppler's `pdftoppm` at
//! twice the native 72 DPI; image sheets are decoded directly. Either way
//! the picture is shrunk to fit [`THUMBNAIL_MAX_DIM`] and re-encoded as JPEG.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// Longest edge of a generated thumbnail, in pixels.
pub const THUMBNAIL_MAX_DIM: u32 = 600;

/// Rasterization resolution for PDF pages (2x the 72 DPI page space).
pub const PDF_RENDER_DPI: u32 = 144;

/// JPEG quality for thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 80;

/// Error type for thumbnail generation.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("no thumbnail renderer for '{0}'")]
    UnsupportedFormat(String),

    #[error("pdftoppm binary not found: {0}")]
    RasterizerUnavailable(std::io::Error),

    #[error("pdftoppm failed (exit code {exit_code:?}): {stderr}")]
    RasterizeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("thumbnail task failed: {0}")]
    Task(String),
}

/// How a sheet file gets turned into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Pdf,
    Image,
}

impl SheetFormat {
    /// Classify a sheet by its file name.
    pub fn detect(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)?;
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" | "webp" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Render a JPEG thumbnail for the sheet in `bytes`.
pub async fn render_sheet_thumbnail(
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<Vec<u8>, ThumbnailError> {
    let format = SheetFormat::detect(file_name)
        .ok_or_else(|| ThumbnailError::UnsupportedFormat(file_name.to_string()))?;

    let raster = match format {
        SheetFormat::Pdf => rasterize_pdf_first_page(&bytes).await?,
        SheetFormat::Image => bytes,
    };

    tokio::task::spawn_blocking(move || encode_thumbnail(&raster))
        .await
        .map_err(|e| ThumbnailError::Task(e.to_string()))?
}

/// Name for the stored thumbnail of a sheet called `file_name`.
pub fn thumbnail_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("sheet");
    format!("{stem}_thumb.jpg")
}

/// Decode an image, fit it within [`THUMBNAIL_MAX_DIM`] and encode as JPEG.
pub fn encode_thumbnail(raster: &[u8]) -> Result<Vec<u8>, ThumbnailError> {
    let decoded = image::load_from_memory(raster)?;
    let fitted = decoded.thumbnail(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM);
    let rgb = DynamicImage::ImageRgb8(fitted.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, THUMBNAIL_JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// Rasterize page one of a PDF into PNG bytes using `pdftoppm`.
async fn rasterize_pdf_first_page(pdf: &[u8]) -> Result<Vec<u8>, ThumbnailError> {
    let work_dir = std::env::temp_dir().join(format!("cantus-thumb-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&work_dir).await?;

    let result = run_pdftoppm(&work_dir, pdf).await;

    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        tracing::debug!(error = %e, dir = %work_dir.display(), "Failed to clean thumbnail work dir");
    }
    result
}

async fn run_pdftoppm(work_dir: &Path, pdf: &[u8]) -> Result<Vec<u8>, ThumbnailError> {
    let input = work_dir.join("sheet.pdf");
    let output_root = work_dir.join("page");
    tokio::fs::write(&input, pdf).await?;

    let dpi = PDF_RENDER_DPI.to_string();
    let output = tokio::process::Command::new("pdftoppm")
        .args(["-f", "1", "-l", "1", "-r", &dpi, "-png", "-singlefile"])
        .arg(&input)
        .arg(&output_root)
        .output()
        .await
        .map_err(ThumbnailError::RasterizerUnavailable)?;

    if !output.status.success() {
        return Err(ThumbnailError::RasterizeFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(tokio::fs::read(output_root.with_extension("png")).await?)
}
