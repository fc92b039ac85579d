const VIDEO_CALL_HOST_PATH: &str = "zoom.us/j/";

/// Checks that a location submitted as a video-call URL is an https Zoom
/// join link with a numeric meeting id.
pub fn is_video_call_link(link: &str) -> bool {
    let Some(rest) = link.strip_prefix("https://") else {
        return false;
    };
    let Some(pos) = rest.find(VIDEO_CALL_HOST_PATH) else {
        return false;
    };

    let meeting_id = rest[pos + VIDEO_CALL_HOST_PATH.len()..]
        .split(['/', '?'])
        .next()
        .unwrap_or_default();

    !meeting_id.is_empty() && meeting_id.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_join_links() {
        assert!(is_video_call_link("https://zoom.us/j/123456789"));
        assert!(is_video_call_link("https://us02web.zoom.us/j/987654321"));
        assert!(is_video_call_link(
            "https://zoom.us/j/123456789?pwd=abcdef"
        ));
    }

    #[test]
    fn test_rejects_other_shapes() {
        // Scheme must be https
        assert!(!is_video_call_link("http://zoom.us/j/123456789"));
        // Meeting id must be present and numeric
        assert!(!is_video_call_link("https://zoom.us/j/"));
        assert!(!is_video_call_link("https://zoom.us/j/abc"));
        // Arbitrary URLs are not video-call links
        assert!(!is_video_call_link("https://example.com/meeting"));
        assert!(!is_video_call_link(""));
    }
}
