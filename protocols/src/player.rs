use pifleet_common::models::dispatch::{DispatchMode, PlayerCommand};
use shell_escape::unix::escape;
use std::borrow::Cow;

/// omxplayer writes its session bus address here for the user running it.
const OMX_DBUS_ENV: &str = "export DBUS_SESSION_BUS_ADDRESS=$(cat /tmp/omxplayerdbus.${USER:-root}); \
     export DBUS_SESSION_BUS_PID=$(cat /tmp/omxplayerdbus.${USER:-root}.pid)";

/// `Action` key code for play/pause toggle.
const OMX_ACTION_PAUSE: u8 = 16;

pub const MESSAGE_FONT: &str = "/usr/share/fonts/FreeSans.ttf";
pub const MESSAGE_FILE: &str = "msg.mp4";
const MESSAGE_SECONDS: u8 = 10;
const MESSAGE_FONT_SIZE: u8 = 48;

/// Shell script that carries out `command` on a player.
///
/// Detached scripts are started in the background and survive the session closing.
pub fn invocation(command: &PlayerCommand, mode: DispatchMode) -> String {
    let script = script(command);
    match mode {
        DispatchMode::Wait => script,
        DispatchMode::Detached => detached(&script),
    }
}

fn script(command: &PlayerCommand) -> String {
    match command {
        PlayerCommand::Pause => format!(
            "{OMX_DBUS_ENV}; dbus-send --print-reply=literal --session --reply-timeout=500 \
             --dest=org.mpris.MediaPlayer2.omxplayer /org/mpris/MediaPlayer2 \
             org.mpris.MediaPlayer2.Player.Action int32:{OMX_ACTION_PAUSE}"
        ),
        PlayerCommand::Mute => "amixer -q set Master mute".to_string(),
        PlayerCommand::Unmute => "amixer -q set Master unmute".to_string(),
        PlayerCommand::Reboot => "sudo reboot".to_string(),
        PlayerCommand::ShowMessage(text) => show_message(text),
    }
}

/// Stops whatever is playing, renders the text into a short clip and plays it on top.
fn show_message(text: &str) -> String {
    let filter = format!(
        "drawtext=fontfile={MESSAGE_FONT}:fontsize={MESSAGE_FONT_SIZE}:fontcolor=white:\
         x=(w-text_w)/2:y=(h-text_h)/2:text='{}'",
        drawtext_escape(text)
    );

    format!(
        "pkill omxplayer; pkill -x ffmpeg; \
         ffmpeg -y -loglevel error -f lavfi -i color=c=black:s=1280x720:d={MESSAGE_SECONDS} \
         -vf {} {MESSAGE_FILE} && omxplayer --no-osd --layer 2 {MESSAGE_FILE}",
        escape(Cow::Owned(filter))
    )
}

/// Escapes text for a single-quoted drawtext `text` option.
fn drawtext_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' | '\r' => out.push(' '),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push('\u{2019}'),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            _ => out.push(c),
        }
    }
    out
}

fn detached(script: &str) -> String {
    format!(
        "nohup sh -c {} >/dev/null 2>&1 &",
        escape(Cow::Borrowed(script))
    )
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
