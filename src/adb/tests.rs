// Tests for transport-level logic that needs no device
// Focus: shell output parsing, framebuffer decoding, disconnect classification

#[cfg(test)]
mod transport_tests {
    use super::super::error::{AdbError, is_disconnect_message};
    use super::super::framebuffer::framebuffer_to_png;
    use super::super::parse::{escape_input_text, parse_foreground_package, parse_screen_size};
    use std::time::Duration;

    // ============================================================
    // SHELL OUTPUT PARSING
    // ============================================================

    #[test]
    fn screen_size_physical() {
        assert_eq!(parse_screen_size("Physical size: 1080x2400\n"), Some((1080, 2400)));
    }

    #[test]
    fn screen_size_override_wins() {
        let out = "Physical size: 1080x2400\nOverride size: 720x1600\n";
        assert_eq!(parse_screen_size(out), Some((720, 1600)));
    }

    #[test]
    fn screen_size_garbage() {
        assert_eq!(parse_screen_size("error: closed"), None);
        assert_eq!(parse_screen_size("Physical size: widexhigh"), None);
    }

    #[test]
    fn foreground_from_current_focus() {
        let out = "  mDisplayId=0\n  mCurrentFocus=Window{9f3c2d1 u0 com.gof.global/com.unity3d.player.UnityPlayerActivity}\n  mFocusedApp=ActivityRecord{1 u0 com.other/.Main t12}\n";
        assert_eq!(parse_foreground_package(out).as_deref(), Some("com.gof.global"));
    }

    #[test]
    fn foreground_falls_back_to_focused_app() {
        let out = "  mCurrentFocus=null\n  mFocusedApp=ActivityRecord{7a u0 com.android.launcher3/.Launcher t5}\n";
        assert_eq!(
            parse_foreground_package(out).as_deref(),
            Some("com.android.launcher3")
        );
    }

    #[test]
    fn foreground_none_when_nothing_focused() {
        assert_eq!(parse_foreground_package("mCurrentFocus=null\nmFocusedApp=null\n"), None);
    }

    #[test]
    fn input_text_escaping() {
        assert_eq!(escape_input_text("hello world"), "hello%sworld");
        assert_eq!(escape_input_text("a&b"), "a\\&b");
        assert_eq!(escape_input_text("it's"), "it\\'s");
        assert_eq!(escape_input_text("Plain123"), "Plain123");
    }

    // ============================================================
    // FRAMEBUFFER DECODING
    // ============================================================

    #[test]
    fn framebuffer_rgba_decodes_to_png() {
        let raw = vec![200u8; 4 * 3 * 2];
        let png = framebuffer_to_png(raw, 3, 2).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn framebuffer_rgb565() {
        // 2x2 pixels of pure red
        let mut raw = Vec::new();
        for _ in 0..4 {
            raw.extend_from_slice(&0xF800u16.to_le_bytes());
        }
        let png = framebuffer_to_png(raw, 2, 2).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(1, 1).0, [255, 0, 0]);
    }

    #[test]
    fn framebuffer_png_passthrough() {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(framebuffer_to_png(png.clone(), 720, 1280).unwrap(), png);
    }

    #[test]
    fn framebuffer_too_small_is_error() {
        let err = framebuffer_to_png(vec![0u8; 5], 10, 10).unwrap_err();
        assert!(matches!(err, AdbError::FramebufferToPngFailed { .. }));
    }

    // ============================================================
    // DISCONNECT CLASSIFICATION
    // ============================================================

    #[test]
    fn disconnect_messages() {
        assert!(is_disconnect_message("error: device offline"));
        assert!(is_disconnect_message("CLSE received"));
        assert!(is_disconnect_message("Broken pipe (os error 32)"));
        assert!(!is_disconnect_message("input: unknown command"));
    }

    #[test]
    fn timeout_counts_as_disconnect() {
        let err = AdbError::Timeout {
            duration: Duration::from_secs(5),
            description: "input tap".into(),
        };
        assert!(err.is_disconnect());
        assert!(!err.is_protocol_desync());
    }

    #[test]
    fn rejected_command_is_not_disconnect() {
        let err = AdbError::ShellCommandFailed {
            command: "input tap 1 1".into(),
            description: "Error: Unknown command".into(),
        };
        assert!(!err.is_disconnect());
        assert!(!AdbError::TapOutOfBounds { x: 9999, y: 1 }.is_disconnect());
    }

    #[test]
    fn desync_is_disconnect() {
        let err = AdbError::ShellCommandFailed {
            command: "screencap".into(),
            description: "no write endpoint".into(),
        };
        assert!(err.is_protocol_desync());
        assert!(err.is_disconnect());
    }
}
