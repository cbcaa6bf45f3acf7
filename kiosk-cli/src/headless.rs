use std::{fmt::Write, fs, path::PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use kiosk_core::{RenderArtifacts, RenderTargets, TargetError, render::BannerKind};

/// Render targets for a host without a screen: every publish writes the
/// composite to `display.png` and the text slots to `display.txt`.
#[derive(Debug)]
pub struct HeadlessTargets {
    dir: PathBuf,
    banner_offset: f32,
}

impl HeadlessTargets {
    pub fn create(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(Self {
            dir,
            banner_offset: 0.0,
        })
    }
}

impl RenderTargets for HeadlessTargets {
    fn publish(&mut self, artifacts: &RenderArtifacts) -> Result<(), TargetError> {
        if !self.dir.is_dir() {
            return Err(TargetError::Gone);
        }

        let image = self.dir.join("display.png");
        let text = self.dir.join("display.txt");
        let image_staging = self.dir.join("display.tmp.png");
        let text_staging = self.dir.join("display.tmp.txt");

        let staged = artifacts
            .background
            .save(&image_staging)
            .map_err(|e| TargetError::Other(format!("{}: {e}", image_staging.display())))
            .and_then(|()| {
                fs::write(&text_staging, describe(artifacts))
                    .map_err(|e| TargetError::Other(format!("{}: {e}", text_staging.display())))
            });
        if let Err(e) = staged {
            let _ = fs::remove_file(&image_staging);
            let _ = fs::remove_file(&text_staging);
            return Err(e);
        }

        for (staging, target) in [(&image_staging, &image), (&text_staging, &text)] {
            fs::rename(staging, target)
                .map_err(|e| TargetError::Other(format!("{}: {e}", target.display())))?;
        }

        debug!(dir = %self.dir.display(), offset = self.banner_offset, "frame written");
        Ok(())
    }

    fn set_banner_offset(&mut self, offset: f32) -> Result<(), TargetError> {
        self.banner_offset = offset;
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> Result<(), TargetError> {
        info!(visible, "cursor");
        Ok(())
    }

    fn show_tooltip(&mut self, text: Option<&str>) -> Result<(), TargetError> {
        match text {
            Some(text) => info!("tooltip: {}", text.replace('\n', " | ")),
            None => debug!("tooltip hidden"),
        }
        Ok(())
    }
}

/// Plain-text rendering of every text slot.
pub fn describe(artifacts: &RenderArtifacts) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", artifacts.location);
    let _ = writeln!(
        out,
        "{}  {}  {}",
        artifacts.temperature, artifacts.description, artifacts.date
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", artifacts.details);
    let _ = writeln!(out);

    for cell in &artifacts.forecast {
        let _ = writeln!(
            out,
            "{:<10} {:<10} {:<12} {:<7} {} {}",
            cell.header, cell.temperatures, cell.range, cell.humidity, cell.sunrise, cell.sunset
        );
    }

    let tag = match artifacts.banner.kind {
        BannerKind::Alert => "ALERT",
        BannerKind::Status => "STATUS",
    };
    let _ = writeln!(out);
    let _ = writeln!(out, "[{tag}] {}", artifacts.banner.text);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use kiosk_core::render::{Banner, ForecastCell};

    fn artifacts(location: &str) -> RenderArtifacts {
        RenderArtifacts {
            location: location.into(),
            temperature: "72°".into(),
            description: "Clear sky".into(),
            date: "03/12".into(),
            details: "Feels: 70°".into(),
            forecast: Default::default(),
            banner: Banner {
                text: "Last Sync: 12:34".into(),
                kind: BannerKind::Status,
            },
            background: RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])),
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("weather-kiosk-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn publish_replaces_both_files() {
        let dir = scratch("frames");
        let mut targets = HeadlessTargets::create(dir.clone()).expect("create output dir");

        targets.publish(&artifacts("Springfield, IL")).expect("publish");

        let text = fs::read_to_string(dir.join("display.txt")).expect("text frame");
        assert!(text.starts_with("Springfield, IL"));
        assert!(dir.join("display.png").is_file());
        assert!(!dir.join("display.tmp.png").exists());
        assert!(!dir.join("display.tmp.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn failed_publish_keeps_previous_frame() {
        let dir = scratch("frames-fail");
        let mut targets = HeadlessTargets::create(dir.clone()).expect("create output dir");
        targets.publish(&artifacts("Springfield, IL")).expect("first publish");
        let before = fs::read(dir.join("display.png")).expect("first image");

        // a directory where the staged text goes makes the second write fail
        fs::create_dir(dir.join("display.tmp.txt")).expect("block text staging");
        let mut next = artifacts("Chicago");
        next.background = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));

        assert!(matches!(targets.publish(&next), Err(TargetError::Other(_))));
        let text = fs::read_to_string(dir.join("display.txt")).expect("text frame");
        assert!(text.starts_with("Springfield, IL"));
        assert_eq!(fs::read(dir.join("display.png")).expect("image frame"), before);
        assert!(!dir.join("display.tmp.png").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn removed_output_is_gone() {
        let dir = scratch("frames-gone");
        let mut targets = HeadlessTargets::create(dir.clone()).expect("create output dir");
        fs::remove_dir_all(&dir).expect("remove output dir");

        assert!(matches!(targets.publish(&artifacts("x")), Err(TargetError::Gone)));
    }

    #[test]
    fn describe_lists_cells_and_banner() {
        let mut frame = artifacts("Springfield, IL");
        frame.forecast[0] = ForecastCell {
            header: "WED 03/13".into(),
            ..ForecastCell::default()
        };

        let text = describe(&frame);
        assert!(text.contains("WED 03/13"));
        assert!(text.trim_end().ends_with("[STATUS] Last Sync: 12:34"));
    }
}
