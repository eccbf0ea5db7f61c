use iced::widget::button;
use iced::{Border, Color};

pub const SURFACE_DARK: Color = Color::from_rgb(0.15, 0.15, 0.15);
pub const SURFACE_LIGHT: Color = Color::from_rgb(0.9, 0.9, 0.9);
pub const TILE_DARK: Color = Color::from_rgb(0.2, 0.2, 0.2);
pub const TILE_LIGHT: Color = Color::from_rgb(0.85, 0.85, 0.85);
pub const ACCENT_DARK: Color = Color::from_rgb(0.4, 0.4, 0.4);
pub const ACCENT_LIGHT: Color = Color::from_rgb(0.3, 0.3, 0.3);
pub const TEXT_DARK: Color = Color::from_rgb(0.9, 0.9, 0.9);
pub const TEXT_LIGHT: Color = Color::from_rgb(0.1, 0.1, 0.1);
pub const RECORDING_RED: Color = Color::from_rgb(0.75, 0.18, 0.18);
pub const BUTTON_RADIUS: f32 = 8.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct MonochromeTheme {
    pub is_dark: bool,
}

impl MonochromeTheme {
    pub fn dark() -> Self {
        Self { is_dark: true }
    }

    pub fn light() -> Self {
        Self { is_dark: false }
    }

    fn pick(&self, dark: Color, light: Color) -> Color {
        if self.is_dark {
            dark
        } else {
            light
        }
    }

    pub fn surface(&self) -> Color {
        self.pick(SURFACE_DARK, SURFACE_LIGHT)
    }

    pub fn tile(&self) -> Color {
        self.pick(TILE_DARK, TILE_LIGHT)
    }

    pub fn accent(&self) -> Color {
        self.pick(ACCENT_DARK, ACCENT_LIGHT)
    }

    pub fn text(&self) -> Color {
        self.pick(TEXT_DARK, TEXT_LIGHT)
    }
}

fn flat_button(background: Color, text_color: Color) -> button::Style {
    button::Style {
        background: Some(iced::Background::Color(background)),
        text_color,
        border: Border {
            color: Color::TRANSPARENT,
            width: 0.0,
            radius: BUTTON_RADIUS.into(),
        },
        shadow: iced::Shadow::default(),
    }
}

pub fn tile_button_style(theme: &MonochromeTheme) -> button::Style {
    flat_button(theme.tile(), theme.text())
}

pub fn primary_button_style(theme: &MonochromeTheme) -> button::Style {
    flat_button(theme.accent(), theme.pick(TEXT_DARK, Color::WHITE))
}

pub fn stop_button_style(theme: &MonochromeTheme, recording: bool) -> button::Style {
    if recording {
        flat_button(RECORDING_RED, Color::WHITE)
    } else {
        tile_button_style(theme)
    }
}

/// Dims a style for buttons that currently have no action.
pub fn disabled(style: button::Style) -> button::Style {
    button::Style {
        text_color: style.text_color.scale_alpha(0.4),
        ..style
    }
}
