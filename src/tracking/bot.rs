//! User-agent based bot detection

/// Substrings that mark a user agent as automated, matched case-insensitively
const BOT_MARKERS: &[&str] = &["bot", "crawl", "spider"];

/// Returns true when the user agent looks like a crawler.
///
/// A missing or blank header is classified by `missing_is_bot`.
pub fn is_bot(user_agent: Option<&str>, missing_is_bot: bool) -> bool {
    match user_agent.map(str::trim).filter(|ua| !ua.is_empty()) {
        None => missing_is_bot,
        Some(ua) => {
            let ua = ua.to_lowercase();
            BOT_MARKERS.iter().any(|marker| ua.contains(marker))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_crawlers() {
        for ua in [
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
            "Mozilla/5.0 (compatible; bingbot/2.0)",
            "Baiduspider+(+http://www.baidu.com/search/spider.htm)",
            "CCBot/2.0 (https://commoncrawl.org/faq/)",
            "facebookexternalhit/1.1 CRAWLER",
        ] {
            assert!(is_bot(Some(ua), false), "{} should be a bot", ua);
        }
    }

    #[test]
    fn browsers_are_human() {
        assert!(!is_bot(
            Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"),
            false,
        ));
        assert!(!is_bot(Some("curl/8.4.0"), false));
    }

    #[test]
    fn missing_user_agent_follows_setting() {
        assert!(!is_bot(None, false));
        assert!(!is_bot(Some("   "), false));
        assert!(is_bot(None, true));
        assert!(is_bot(Some(""), true));
    }
}
