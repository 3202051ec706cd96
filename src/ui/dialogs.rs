use std::path::PathBuf;

/// Modal file prompts. `None` means the user cancelled.
pub trait FilePrompt {
    fn pick_source(&mut self) -> Option<PathBuf>;
    fn pick_destination(&mut self) -> Option<PathBuf>;
}

/// Native dialogs through `rfd`.
#[derive(Debug, Default)]
pub struct RfdPrompt;

impl FilePrompt for RfdPrompt {
    fn pick_source(&mut self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Open MIDI file")
            .add_filter("MIDI", &["mid", "midi"])
            .pick_file()
    }

    fn pick_destination(&mut self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Save video")
            .add_filter("MP4 video", &["mp4"])
            .set_file_name("output.mp4")
            .save_file()
    }
}
