use iced::widget::{button, column, container, horizontal_space, image, pick_list, row, text, toggler};
use iced::{Alignment, Border, Color, Element, Length};

use crate::recording::{Container, FrameRate, RecordingState};
use crate::ui::style::{
    disabled, primary_button_style, stop_button_style, tile_button_style, MonochromeTheme,
};
use crate::ui::Message;

pub struct MainViewModel<'a> {
    pub recording_state: RecordingState,
    pub finishing: bool,
    pub fps: FrameRate,
    pub extension: Container,
    pub show_preview: bool,
    pub output_dir: String,
    pub hotkey: String,
    pub status: &'a str,
    pub preview: Option<&'a image::Handle>,
}

pub struct MainView;

impl MainView {
    pub fn view<'a>(theme: &MonochromeTheme, model: MainViewModel<'a>) -> Element<'a, Message> {
        let idle = model.recording_state == RecordingState::Idle && !model.finishing;
        let recording = model.recording_state == RecordingState::Recording;

        let start_style = primary_button_style(theme);
        let stop_style = stop_button_style(theme, recording);
        let start_btn = button(text("Start Recording").size(13))
            .padding([6, 12])
            .style(move |_t, status| styled(start_style, status))
            .on_press_maybe(idle.then_some(Message::StartRecording));
        let stop_btn = button(text("Stop Recording").size(13))
            .padding([6, 12])
            .style(move |_t, status| styled(stop_style, status))
            .on_press_maybe(recording.then_some(Message::StopRecording));

        let indicator = match (model.recording_state, model.finishing) {
            (RecordingState::Recording, _) => text("[REC]").size(11),
            (RecordingState::Idle, true) => text("[...]").size(11),
            (RecordingState::Idle, false) => text("").size(11),
        };

        let controls = row![start_btn, stop_btn, horizontal_space(), indicator]
            .spacing(10)
            .align_y(Alignment::Center);

        let options = row![
            text("FPS").size(12),
            pick_list(FrameRate::all(), Some(model.fps), Message::FpsSelected).width(80),
            text("Format").size(12),
            pick_list(Container::all(), Some(model.extension), Message::ExtensionSelected)
                .width(90),
            horizontal_space(),
            toggler(model.show_preview)
                .label("Preview")
                .on_toggle(Message::PreviewToggled),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let browse_style = tile_button_style(theme);
        let output = row![
            text(model.output_dir).size(11).width(Length::Fill),
            button(text("Browse").size(11))
                .padding([4, 8])
                .style(move |_t, status| styled(browse_style, status))
                .on_press_maybe(idle.then_some(Message::BrowseOutputDir)),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let mut content = column![controls, options, output].spacing(12);

        if let Some(handle) = model.preview {
            content = content.push(
                container(image(handle.clone()).width(Length::Fill))
                    .width(Length::Fill)
                    .center_x(Length::Fill),
            );
        }

        let hint = if recording {
            format!("Press Q or {} to stop", model.hotkey)
        } else {
            format!("{} toggles recording", model.hotkey)
        };
        content = content.push(text(model.status.to_string()).size(11));
        content = content.push(text(hint).size(10));

        let surface = theme.surface();
        let border_color = if theme.is_dark {
            Color::from_rgb(0.3, 0.3, 0.3)
        } else {
            Color::from_rgb(0.7, 0.7, 0.7)
        };

        container(content.padding(12))
            .width(Length::Fill)
            .height(Length::Fill)
            .style(move |_| container::Style {
                background: Some(iced::Background::Color(surface)),
                border: Border {
                    color: border_color,
                    width: 1.0,
                    radius: 8.0.into(),
                },
                ..Default::default()
            })
            .into()
    }
}

fn styled(style: button::Style, status: button::Status) -> button::Style {
    match status {
        button::Status::Disabled => disabled(style),
        _ => style,
    }
}
