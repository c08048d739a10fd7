/// Scroll state for the log pane, measured in rows.
///
/// `scroll_top` is the index of the first visible content row. Prepending
/// older pages grows `content_height` from the top, so keeping the same
/// content under the reader's eyes means shifting `scroll_top` by exactly
/// the height delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub content_height: usize,
    pub viewport_height: usize,
    pub scroll_top: usize,
}

impl Viewport {
    pub fn new(viewport_height: usize) -> Self {
        Self {
            content_height: 0,
            viewport_height,
            scroll_top: 0,
        }
    }

    pub fn max_scroll_top(&self) -> usize {
        self.content_height.saturating_sub(self.viewport_height)
    }

    pub fn set_content_height(&mut self, content_height: usize) {
        self.content_height = content_height;
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
    }

    /// Initial-load placement: newest lines visible without any older fetch.
    pub fn anchor_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll_top();
    }

    /// Anchor correction after a prepend: `scroll_top += height delta`, so
    /// the row the user was reading stays at the same on-screen position.
    /// Must be called after `content_height` reflects the inserted page.
    pub fn preserve_anchor(&mut self, before_height: usize) {
        let grown = self.content_height.saturating_sub(before_height);
        self.scroll_top = (self.scroll_top + grown).min(self.max_scroll_top());
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_top = (self.scroll_top + rows).min(self.max_scroll_top());
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_top = self.scroll_top.saturating_sub(rows);
    }

    /// True when the sentinel band at the top of the content is inside the
    /// visible window. Short content keeps the sentinel permanently visible,
    /// which matches the trigger firing until the pane fills.
    pub fn near_top(&self, sentinel_rows: usize) -> bool {
        self.scroll_top < sentinel_rows.max(1)
    }

    /// Half-open row range currently visible, for the renderer.
    pub fn visible_range(&self) -> (usize, usize) {
        let end = (self.scroll_top + self.viewport_height).min(self.content_height);
        (self.scroll_top.min(end), end)
    }
}

#[cfg(test)]
mod tests {
    use super::Viewport;

    #[test]
    fn bottom_anchor_shows_the_newest_rows() {
        let mut viewport = Viewport::new(10);
        viewport.set_content_height(25);
        viewport.anchor_to_bottom();
        assert_eq!(viewport.scroll_top, 15);
        assert_eq!(viewport.visible_range(), (15, 25));

        let mut short = Viewport::new(10);
        short.set_content_height(4);
        short.anchor_to_bottom();
        assert_eq!(short.scroll_top, 0);
        assert_eq!(short.visible_range(), (0, 4));
    }

    #[test]
    fn preserve_anchor_shifts_by_the_height_delta() {
        let mut viewport = Viewport::new(10);
        viewport.set_content_height(30);
        viewport.scroll_top = 2;

        // 7 older rows prepended.
        viewport.set_content_height(37);
        viewport.preserve_anchor(30);
        assert_eq!(viewport.scroll_top, 9);

        // Repeating with an equal-size insertion shifts by the same amount.
        viewport.set_content_height(44);
        viewport.preserve_anchor(37);
        assert_eq!(viewport.scroll_top, 16);
    }

    #[test]
    fn anchor_correction_clamps_to_scrollable_range() {
        let mut viewport = Viewport::new(10);
        viewport.set_content_height(12);
        viewport.scroll_top = 2;
        viewport.set_content_height(13);
        viewport.preserve_anchor(12);
        assert_eq!(viewport.scroll_top, 3);
        assert_eq!(viewport.scroll_top, viewport.max_scroll_top());
    }

    #[test]
    fn sentinel_visibility_tracks_the_top_band() {
        let mut viewport = Viewport::new(10);
        viewport.set_content_height(50);
        viewport.anchor_to_bottom();
        assert!(!viewport.near_top(2));

        viewport.scroll_up(39);
        assert!(viewport.near_top(2));

        let mut short = Viewport::new(10);
        short.set_content_height(3);
        assert!(short.near_top(2));
    }

    #[test]
    fn shrinking_content_clamps_scroll_top() {
        let mut viewport = Viewport::new(5);
        viewport.set_content_height(40);
        viewport.anchor_to_bottom();
        assert_eq!(viewport.scroll_top, 35);
        viewport.set_content_height(8);
        assert_eq!(viewport.scroll_top, 3);
    }
}
