use ratatui::style::{Color, Modifier, Style};

/// Palette shared by every page and overlay.
#[derive(Debug, Clone)]
pub struct Theme {
    pub fg: Color,
    pub bg: Color,
    pub dim: Color,
    pub border: Color,
    pub focus_border: Color,
    pub cursor_bg: Color,
    pub cursor_fg: Color,
    pub up: Color,
    pub down: Color,
    pub accent: Color,
    pub input: Color,
    pub title: Color,
    pub error: Color,
    /// Line colours for the top coin graphs, in rank order.
    pub graphs: [Color; 3],
}

impl Default for Theme {
    fn default() -> Self {
        dark()
    }
}

impl Theme {
    pub fn text(&self) -> Style {
        Style::default().fg(self.fg)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.dim)
    }

    pub fn header(&self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub fn cursor(&self) -> Style {
        Style::default().bg(self.cursor_bg).fg(self.cursor_fg)
    }

    pub fn border_for(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.focus_border)
        } else {
            Style::default().fg(self.border)
        }
    }

    /// Colour of a signed change.
    pub fn trend(&self, value: f64) -> Color {
        if value > 0.0 {
            self.up
        } else if value < 0.0 {
            self.down
        } else {
            self.dim
        }
    }
}

pub const THEME_NAMES: &[&str] = &["dark", "solarized-dark", "light", "no-color"];

pub fn by_name(name: &str) -> Theme {
    match name {
        "solarized-dark" => solarized_dark(),
        "light" => light(),
        "no-color" => no_color(),
        _ => dark(),
    }
}

pub fn dark() -> Theme {
    Theme {
        fg: Color::Indexed(253),
        bg: Color::Reset,
        dim: Color::Indexed(243),
        border: Color::Indexed(240),
        focus_border: Color::Indexed(81),  // sky cyan
        cursor_bg: Color::Indexed(237),
        cursor_fg: Color::Indexed(255),
        up: Color::Indexed(46),
        down: Color::Indexed(196),
        accent: Color::Indexed(81),
        input: Color::Indexed(220),        // gold
        title: Color::Indexed(255),
        error: Color::Indexed(196),
        graphs: [Color::Indexed(214), Color::Indexed(75), Color::Indexed(120)],
    }
}

pub fn solarized_dark() -> Theme {
    Theme {
        fg: Color::Indexed(246),           // base0
        bg: Color::Reset,
        dim: Color::Indexed(240),          // base01
        border: Color::Indexed(23),        // base02
        focus_border: Color::Indexed(37),  // cyan
        cursor_bg: Color::Indexed(23),
        cursor_fg: Color::Indexed(230),    // base3
        up: Color::Indexed(64),
        down: Color::Indexed(160),
        accent: Color::Indexed(37),
        input: Color::Indexed(136),        // yellow
        title: Color::Indexed(33),         // blue
        error: Color::Indexed(166),        // orange
        graphs: [Color::Indexed(136), Color::Indexed(33), Color::Indexed(64)],
    }
}

pub fn light() -> Theme {
    Theme {
        fg: Color::Indexed(235),
        bg: Color::Indexed(255),
        dim: Color::Indexed(245),
        border: Color::Indexed(250),
        focus_border: Color::Indexed(25),
        cursor_bg: Color::Indexed(153),
        cursor_fg: Color::Indexed(232),
        up: Color::Indexed(28),
        down: Color::Indexed(160),
        accent: Color::Indexed(25),
        input: Color::Indexed(130),
        title: Color::Indexed(232),
        error: Color::Indexed(160),
        graphs: [Color::Indexed(130), Color::Indexed(25), Color::Indexed(28)],
    }
}

pub fn no_color() -> Theme {
    Theme {
        fg: Color::Reset,
        bg: Color::Reset,
        dim: Color::Reset,
        border: Color::Reset,
        focus_border: Color::Reset,
        cursor_bg: Color::Reset,
        cursor_fg: Color::Reset,
        up: Color::Reset,
        down: Color::Reset,
        accent: Color::Reset,
        input: Color::Reset,
        title: Color::Reset,
        error: Color::Reset,
        graphs: [Color::Reset; 3],
    }
}
