//! Named style cache, for styles shared by reference between maps.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::style::Style;

/// Styles by name, shared between maps and threads.
///
/// Every operation takes the cache lock for its own duration only.
#[derive(Debug, Default)]
pub struct StyleCache {
    styles: Mutex<BTreeMap<String, Arc<Style>>>,
}

impl StyleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a style. Returns false, keeping the cached style, if the name is taken.
    pub fn insert(&self, name: impl Into<String>, style: Style) -> bool {
        let name = name.into();
        let mut styles = self.styles.lock();
        if styles.contains_key(&name) {
            return false;
        }

        log::trace!("Caching style '{name}'");
        styles.insert(name, Arc::new(style));
        true
    }

    /// Removes the style.
    pub fn remove(&self, name: &str) -> Option<Arc<Style>> {
        self.styles.lock().remove(name)
    }

    /// Returns the style with the name, or [`Style::fallback`] if there is none.
    ///
    /// Use [`StyleCache::contains`] to tell the two cases apart.
    pub fn find(&self, name: &str) -> Arc<Style> {
        if let Some(style) = self.styles.lock().get(name) {
            return style.clone();
        }

        log::warn!("Style '{name}' is not cached, using the default style");
        Arc::new(Style::fallback())
    }

    /// Returns true if a style with the name is cached.
    pub fn contains(&self, name: &str) -> bool {
        self.styles.lock().contains_key(name)
    }

    /// Names of the cached styles, sorted.
    pub fn names(&self) -> Vec<String> {
        self.styles.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Rule, Symbolizer};

    #[test]
    fn missing_style_falls_back_to_red_line() {
        let cache = StyleCache::new();
        let style = cache.find("nothing");
        assert!(!cache.contains("nothing"));

        let symbolizers = &style.rules()[0].symbolizers;
        assert_eq!(symbolizers.len(), 1);
        match &symbolizers[0] {
            Symbolizer::Line(line) => assert_eq!(line.stroke.color, crate::Color::RED),
            other => panic!("unexpected symbolizer {other:?}"),
        }
    }

    #[test]
    fn insert_keeps_first_style() {
        let cache = StyleCache::new();
        let roads = Style::new().with_rule(Rule::new("roads"));
        assert!(cache.insert("roads", roads.clone()));
        assert!(!cache.insert("roads", Style::new()));
        assert_eq!(*cache.find("roads"), roads);
        assert_eq!(cache.names(), vec!["roads".to_string()]);

        assert!(cache.remove("roads").is_some());
        assert!(!cache.contains("roads"));
    }

    #[test]
    fn shared_between_threads() {
        let cache = Arc::new(StyleCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.insert(format!("style-{i}"), Style::new()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.names().len(), 4);
    }
}
