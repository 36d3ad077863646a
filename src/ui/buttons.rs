use serenity::all::ButtonStyle;
use serenity::builder::{CreateActionRow, CreateButton};

/// IDs personalizados para los botones del panel
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "music_play_pause";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
    pub const VOLUME_DOWN: &str = "music_volume_down";
    pub const VOLUME_UP: &str = "music_volume_up";
    pub const QUEUE: &str = "music_queue";
}

/// Paso de volumen de los botones 🔉/🔊, en puntos porcentuales.
pub const VOLUME_STEP: i64 = 10;

/// Constructor del panel de controles del reproductor
pub struct MusicControls;

impl MusicControls {
    /// Crea las filas de botones del panel; el botón play/pause refleja el
    /// estado actual.
    pub fn create_player_controls(is_playing: bool) -> Vec<CreateActionRow> {
        let play_pause_emoji = if is_playing { '⏸' } else { '▶' };

        let play_pause_btn = CreateButton::new(button_ids::PLAY_PAUSE)
            .emoji(play_pause_emoji)
            .style(ButtonStyle::Primary);

        let skip_btn = CreateButton::new(button_ids::SKIP)
            .emoji('⏭')
            .style(ButtonStyle::Secondary);

        let stop_btn = CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger);

        let row1 = CreateActionRow::Buttons(vec![play_pause_btn, skip_btn, stop_btn]);

        let vol_down_btn = CreateButton::new(button_ids::VOLUME_DOWN)
            .emoji('🔉')
            .style(ButtonStyle::Secondary);

        let vol_up_btn = CreateButton::new(button_ids::VOLUME_UP)
            .emoji('🔊')
            .style(ButtonStyle::Secondary);

        let queue_btn = CreateButton::new(button_ids::QUEUE)
            .label("Cola")
            .emoji('📋')
            .style(ButtonStyle::Secondary);

        let row2 = CreateActionRow::Buttons(vec![vol_down_btn, vol_up_btn, queue_btn]);

        vec![row1, row2]
    }
}

/// Nuevo nivel de volumen tras un botón 🔉/🔊, acotado a 0-100.
pub fn stepped_volume(current: u8, delta: i64) -> i64 {
    (current as i64 + delta).clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stepped_volume_clamps_at_bounds() {
        assert_eq!(stepped_volume(50, VOLUME_STEP), 60);
        assert_eq!(stepped_volume(50, -VOLUME_STEP), 40);
        assert_eq!(stepped_volume(95, VOLUME_STEP), 100);
        assert_eq!(stepped_volume(5, -VOLUME_STEP), 0);
        assert_eq!(stepped_volume(100, VOLUME_STEP), 100);
        assert_eq!(stepped_volume(0, -VOLUME_STEP), 0);
    }
}
