use unicode_segmentation::UnicodeSegmentation;

use super::App;

impl App {
    fn input_graphemes(&self) -> Vec<&str> {
        self.input.graphemes(true).collect()
    }

    pub fn input_len(&self) -> usize {
        self.input.graphemes(true).count()
    }

    pub fn insert_text(&mut self, s: &str) {
        let parts = self.input_graphemes();
        let idx = self.input_cursor.min(parts.len());
        let mut next = parts[..idx].concat();
        next.push_str(s);
        next.push_str(&parts[idx..].concat());
        self.input = next;
        let added = s.graphemes(true).count();
        self.input_cursor = (idx + added).min(self.input_len());
    }

    pub fn delete_left_grapheme(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut parts = self.input_graphemes();
        let idx = self.input_cursor.min(parts.len());
        parts.remove(idx - 1);
        self.input = parts.concat();
        self.input_cursor = idx - 1;
    }

    pub fn delete_right_grapheme(&mut self) {
        let mut parts = self.input_graphemes();
        let idx = self.input_cursor.min(parts.len());
        if idx < parts.len() {
            parts.remove(idx);
            self.input = parts.concat();
        }
    }

    fn line_start_of(parts: &[&str], from: usize) -> usize {
        let mut i = from.min(parts.len());
        while i > 0 && parts[i - 1] != "\n" {
            i -= 1;
        }
        i
    }

    fn line_end_of(parts: &[&str], from: usize) -> usize {
        let mut i = from.min(parts.len());
        while i < parts.len() && parts[i] != "\n" {
            i += 1;
        }
        i
    }

    fn word_start_before(parts: &[&str], from: usize) -> usize {
        let mut i = from.min(parts.len());
        while i > 0 && parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        while i > 0 && !parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        i
    }

    pub fn move_cursor_line_start(&mut self) {
        self.input_cursor = Self::line_start_of(&self.input_graphemes(), self.input_cursor);
    }

    pub fn move_cursor_line_end(&mut self) {
        self.input_cursor = Self::line_end_of(&self.input_graphemes(), self.input_cursor);
    }

    pub fn move_cursor_word_left(&mut self) {
        self.input_cursor = Self::word_start_before(&self.input_graphemes(), self.input_cursor);
    }

    pub fn move_cursor_word_right(&mut self) {
        let parts = self.input_graphemes();
        let mut i = self.input_cursor.min(parts.len());
        while i < parts.len() && parts[i].trim().is_empty() {
            i += 1;
        }
        while i < parts.len() && !parts[i].trim().is_empty() {
            i += 1;
        }
        self.input_cursor = i;
    }

    fn remove_range(&mut self, start: usize, end: usize) {
        let mut parts = self.input_graphemes();
        let end = end.min(parts.len());
        if start >= end {
            return;
        }
        parts.drain(start..end);
        self.input = parts.concat();
    }

    pub fn delete_prev_word(&mut self) {
        let cur = self.input_cursor.min(self.input_len());
        let start = Self::word_start_before(&self.input_graphemes(), cur);
        self.remove_range(start, cur);
        self.input_cursor = start;
    }

    pub fn kill_to_line_start(&mut self) {
        let cur = self.input_cursor.min(self.input_len());
        let start = Self::line_start_of(&self.input_graphemes(), cur);
        self.remove_range(start, cur);
        self.input_cursor = start;
    }

    pub fn kill_to_line_end(&mut self) {
        let cur = self.input_cursor.min(self.input_len());
        let end = Self::line_end_of(&self.input_graphemes(), cur);
        self.remove_range(cur, end);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_app;

    #[test]
    fn editing_by_grapheme() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.insert_text("héllo wörld");
        assert_eq!(app.input_len(), 11);
        app.move_cursor_word_left();
        assert_eq!(app.input_cursor, 6);
        app.delete_left_grapheme();
        assert_eq!(app.input, "héllowörld");
        app.insert_text("\u{1F44D}");
        assert_eq!(app.input, "héllo\u{1F44D}wörld");
        assert_eq!(app.input_cursor, 6);
        app.delete_prev_word();
        assert_eq!(app.input, "wörld");
        assert_eq!(app.input_cursor, 0);
        app.delete_right_grapheme();
        assert_eq!(app.input, "örld");
    }

    #[test]
    fn line_kills_stop_at_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.insert_text("first\nsecond line");
        app.input_cursor = 9;
        app.kill_to_line_end();
        assert_eq!(app.input, "first\nsec");
        app.kill_to_line_start();
        assert_eq!(app.input, "first\n");
        assert_eq!(app.input_cursor, 6);
        app.move_cursor_line_start();
        assert_eq!(app.input_cursor, 6);
        app.input_cursor = 2;
        app.move_cursor_line_end();
        assert_eq!(app.input_cursor, 5);
    }
}
