// Headlines returned by the news endpoint. These are held by whichever view
// asked for them and never merged into the grouping tree.

use chrono::{DateTime, FixedOffset};

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub id: String,
    pub headline: String,
    /// `None` when the feed omitted the timestamp or sent one we can't parse.
    pub published: Option<DateTime<FixedOffset>>,
}

impl NewsItem {
    /// Publication time formatted for a list row, e.g. "Apr 3, 2012 14:05".
    pub fn published_label(&self) -> String {
        self.published
            .map(|ts| ts.format("%b %-d, %Y %H:%M").to_string())
            .unwrap_or_default()
    }
}
