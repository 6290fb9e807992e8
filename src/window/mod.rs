//! Window multiplexing: splits, layout, rotation
//!
//! Windows tile the screen area above the minibuffer line. A split halves
//! the current window's rect; closing a window hands its rect to an
//! adjacent sibling. Rescaling on terminal resize scales every rect by the
//! new dimensions, enforcing minimum sizes and clipping windows that would
//! land outside the screen.

use crate::constants::ui::{MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};
use crate::view::{Rect, View};

/// Which way the originating split divided the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDir {
    /// Stacked: the rect was cut along a horizontal line
    Horizontal,
    /// Side by side: the rect was cut along a vertical line
    Vertical,
}

/// One on-screen window; the buffer link is a plain id, never a pointer
#[derive(Debug)]
pub struct Window {
    pub id: usize,
    pub buffer_id: usize,
    pub rect: Rect,
    pub view: View,
    pub split_origin: Option<SplitDir>,
    /// Set while a shift-selection is extending; any plain motion clears
    /// the mark when this is on
    pub shift_select: bool,
}

impl Window {
    fn new(id: usize, buffer_id: usize, rect: Rect) -> Self {
        Self {
            id,
            buffer_id,
            rect,
            view: View::new(),
            split_origin: None,
            shift_select: false,
        }
    }
}

/// The set of windows and the current-window pointer
#[derive(Debug)]
pub struct WindowManager {
    windows: Vec<Window>,
    current: usize,
    next_id: usize,
    screen_w: usize,
    screen_h: usize,
}

impl WindowManager {
    /// One full-size window showing `buffer_id`
    pub fn new(screen_w: usize, screen_h: usize, buffer_id: usize) -> Self {
        let rect = Rect {
            x: 0,
            y: 0,
            w: screen_w,
            h: screen_h,
        };
        Self {
            windows: vec![Window::new(1, buffer_id, rect)],
            current: 0,
            next_id: 2,
            screen_w,
            screen_h,
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn current(&self) -> &Window {
        &self.windows[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Window {
        &mut self.windows[self.current]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Window> {
        self.windows.iter_mut()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Split the current window into top and bottom halves sharing a buffer
    pub fn split_horizontal(&mut self) -> bool {
        let rect = self.current().rect;
        if rect.h / 2 < MIN_WINDOW_HEIGHT {
            return false;
        }
        let top_h = rect.h / 2;
        let bottom = Rect {
            x: rect.x,
            y: rect.y + top_h,
            w: rect.w,
            h: rect.h - top_h,
        };
        self.windows[self.current].rect.h = top_h;
        self.windows[self.current].view.mark_full_redraw();
        let buffer_id = self.current().buffer_id;
        let mut win = Window::new(self.next_id, buffer_id, bottom);
        win.split_origin = Some(SplitDir::Horizontal);
        self.next_id += 1;
        self.windows.insert(self.current + 1, win);
        true
    }

    /// Split the current window into left and right halves sharing a buffer
    pub fn split_vertical(&mut self) -> bool {
        let rect = self.current().rect;
        if rect.w / 2 < MIN_WINDOW_WIDTH {
            return false;
        }
        let left_w = rect.w / 2;
        let right = Rect {
            x: rect.x + left_w,
            y: rect.y,
            w: rect.w - left_w,
            h: rect.h,
        };
        self.windows[self.current].rect.w = left_w;
        self.windows[self.current].view.mark_full_redraw();
        let buffer_id = self.current().buffer_id;
        let mut win = Window::new(self.next_id, buffer_id, right);
        win.split_origin = Some(SplitDir::Vertical);
        self.next_id += 1;
        self.windows.insert(self.current + 1, win);
        true
    }

    /// Close the current window, handing its rect to an adjacent sibling.
    /// The last window cannot be closed.
    pub fn close_current(&mut self) -> bool {
        if self.windows.len() <= 1 {
            return false;
        }
        let gone = self.windows.remove(self.current);
        if self.current >= self.windows.len() {
            self.current = 0;
        }
        let absorbed = self.absorb_rect(gone.rect);
        if !absorbed {
            self.recalculate_window_sizes(self.screen_w, self.screen_h);
        }
        for w in &mut self.windows {
            w.view.mark_full_redraw();
        }
        true
    }

    /// Give a freed rect to a window sharing a full edge with it
    fn absorb_rect(&mut self, rect: Rect) -> bool {
        for w in &mut self.windows {
            let r = w.rect;
            if r.x == rect.x && r.w == rect.w {
                if r.y + r.h == rect.y {
                    w.rect.h += rect.h;
                    return true;
                }
                if rect.y + rect.h == r.y {
                    w.rect.y = rect.y;
                    w.rect.h += rect.h;
                    return true;
                }
            }
            if r.y == rect.y && r.h == rect.h {
                if r.x + r.w == rect.x {
                    w.rect.w += rect.w;
                    return true;
                }
                if rect.x + rect.w == r.x {
                    w.rect.x = rect.x;
                    w.rect.w += rect.w;
                    return true;
                }
            }
        }
        false
    }

    /// Keep only the current window, full screen
    pub fn close_others(&mut self) {
        let keep = self.windows.remove(self.current);
        self.windows.clear();
        self.windows.push(keep);
        self.current = 0;
        self.windows[0].rect = Rect {
            x: 0,
            y: 0,
            w: self.screen_w,
            h: self.screen_h,
        };
        self.windows[0].view.mark_full_redraw();
    }

    pub fn next_window(&mut self) {
        self.current = (self.current + 1) % self.windows.len();
    }

    pub fn prev_window(&mut self) {
        self.current = (self.current + self.windows.len() - 1) % self.windows.len();
    }

    /// Rebind every window showing `from` to `to` (buffer deletion)
    pub fn rebind_buffer(&mut self, from: usize, to: usize) {
        for w in &mut self.windows {
            if w.buffer_id == from {
                w.buffer_id = to;
                w.view = View::new();
            }
        }
    }

    /// Rescale every rect to new screen dimensions, enforcing minimum sizes
    /// and clipping rects that fall outside the screen
    pub fn recalculate_window_sizes(&mut self, new_w: usize, new_h: usize) {
        let (old_w, old_h) = (self.screen_w.max(1), self.screen_h.max(1));
        self.screen_w = new_w;
        self.screen_h = new_h;
        for w in &mut self.windows {
            let r = &mut w.rect;
            r.x = r.x * new_w / old_w;
            r.y = r.y * new_h / old_h;
            r.w = (r.w * new_w / old_w).max(MIN_WINDOW_WIDTH);
            r.h = (r.h * new_h / old_h).max(MIN_WINDOW_HEIGHT);
            // Clip anything pushed past the screen edge
            if r.x + r.w > new_w {
                if r.x >= new_w {
                    r.x = new_w.saturating_sub(MIN_WINDOW_WIDTH);
                }
                r.w = new_w.saturating_sub(r.x);
            }
            if r.y + r.h > new_h {
                if r.y >= new_h {
                    r.y = new_h.saturating_sub(MIN_WINDOW_HEIGHT);
                }
                r.h = new_h.saturating_sub(r.y);
            }
            w.view.mark_full_redraw();
        }
    }
}
