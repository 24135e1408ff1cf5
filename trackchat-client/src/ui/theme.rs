//! Display palette

use ratatui::style::{Color, Modifier, Style};

use trackchat_protocol::{NoticeKind, Role};

/// Named color slots used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteSlot {
    Timestamp,
    Punctuation,
    Body,
    Regular,
    Staff,
    System,
    Notice,
    Warning,
    Border,
    Title,
    Hint,
}

impl PaletteSlot {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Regular => Self::Regular,
            Role::Staff => Self::Staff,
            Role::System => Self::System,
        }
    }

    pub fn for_notice(kind: &NoticeKind) -> Self {
        if kind.is_error() {
            Self::Warning
        } else {
            Self::Notice
        }
    }
}

/// Maps slots onto terminal styles
#[derive(Debug, Clone)]
pub struct Palette {
    pub timestamp: Style,
    pub punctuation: Style,
    pub body: Style,
    pub regular: Style,
    pub staff: Style,
    pub system: Style,
    pub notice: Style,
    pub warning: Style,
    pub border: Style,
    pub title: Style,
    pub hint: Style,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            timestamp: Style::default().fg(Color::Gray),
            punctuation: Style::default().fg(Color::DarkGray),
            body: Style::default(),
            regular: Style::default().fg(Color::Cyan),
            staff: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            system: Style::default().fg(Color::Yellow),
            notice: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            warning: Style::default().fg(Color::Red),
            border: Style::default().fg(Color::DarkGray),
            title: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            hint: Style::default().fg(Color::DarkGray),
        }
    }
}

impl Palette {
    pub fn style(&self, slot: PaletteSlot) -> Style {
        match slot {
            PaletteSlot::Timestamp => self.timestamp,
            PaletteSlot::Punctuation => self.punctuation,
            PaletteSlot::Body => self.body,
            PaletteSlot::Regular => self.regular,
            PaletteSlot::Staff => self.staff,
            PaletteSlot::System => self.system,
            PaletteSlot::Notice => self.notice,
            PaletteSlot::Warning => self.warning,
            PaletteSlot::Border => self.border,
            PaletteSlot::Title => self.title,
            PaletteSlot::Hint => self.hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_slots_are_distinct() {
        let palette = Palette::default();
        let regular = palette.style(PaletteSlot::for_role(Role::Regular));
        let staff = palette.style(PaletteSlot::for_role(Role::Staff));
        let system = palette.style(PaletteSlot::for_role(Role::System));
        assert_ne!(regular, staff);
        assert_ne!(staff, system);
        assert_ne!(regular, system);
    }

    #[test]
    fn test_error_notices_use_warning() {
        assert_eq!(PaletteSlot::for_notice(&NoticeKind::SendFailed), PaletteSlot::Warning);
        assert_eq!(PaletteSlot::for_notice(&NoticeKind::Info), PaletteSlot::Notice);
        assert_eq!(
            PaletteSlot::for_notice(&NoticeKind::Reconnected { attempt: 1 }),
            PaletteSlot::Notice
        );
    }
}
