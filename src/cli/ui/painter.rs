use owo_colors::{OwoColorize, Style as OwoStyle};

/// Terminal tone of a rendered fragment.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Tone {
    Heading,
    Good,
    Attention,
    Muted,
    Emphasis,
}

impl Tone {
    fn style(self) -> OwoStyle {
        match self {
            Self::Heading => OwoStyle::new().bold().cyan(),
            Self::Good => OwoStyle::new().bold().green(),
            Self::Attention => OwoStyle::new().bold().yellow(),
            Self::Muted => OwoStyle::new().dimmed(),
            Self::Emphasis => OwoStyle::new().bold(),
        }
    }
}

/// Colours instrument output for the terminal, or passes it through plain.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Heading)
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Good)
    }

    pub(crate) fn warning<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Attention)
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Muted)
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Emphasis)
    }

    /// Record checksum, flagged when it disagrees with the computed sum.
    pub(crate) fn checksum(&self, checksum: u8, valid: bool) -> String {
        let label = format!("0x{checksum:02X}");
        if valid {
            self.paint(&label, Tone::Good)
        } else {
            self.paint(&format!("{label} (mismatch)"), Tone::Attention)
        }
    }

    /// Instrument error counter; any non-zero count needs attention.
    pub(crate) fn error_count(&self, count: u32) -> String {
        let tone = if count == 0 { Tone::Good } else { Tone::Attention };
        self.paint(&count.to_string(), tone)
    }

    /// Status flag rendered as `on`/`off`.
    pub(crate) fn switch(&self, on: bool) -> String {
        if on {
            self.paint("on", Tone::Attention)
        } else {
            self.paint("off", Tone::Muted)
        }
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if self.use_colour {
            format!("{}", text.style(tone.style()))
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::valid(0x3B, true, "0x3B")]
    #[case::mismatch(0x07, false, "0x07 (mismatch)")]
    fn plain_checksum_marks_mismatches(
        #[case] checksum: u8,
        #[case] valid: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(expected, Painter::new(false).checksum(checksum, valid));
    }

    #[rstest]
    #[case::zero(0, "0")]
    #[case::some(12, "12")]
    fn plain_error_count_is_the_number(#[case] count: u32, #[case] expected: &str) {
        assert_eq!(expected, Painter::new(false).error_count(count));
    }

    #[test]
    fn plain_switch_reads_on_and_off() {
        let painter = Painter::new(false);
        assert_eq!(("on", "off"), (&*painter.switch(true), &*painter.switch(false)));
    }

    #[rstest]
    #[case::heading(Tone::Heading)]
    #[case::good(Tone::Good)]
    #[case::attention(Tone::Attention)]
    #[case::muted(Tone::Muted)]
    #[case::emphasis(Tone::Emphasis)]
    fn colour_wraps_text_in_escape_codes(#[case] tone: Tone) {
        let styled = Painter::new(true).paint("pco2w", tone);
        assert_ne!("pco2w", styled);
        assert!(styled.contains("pco2w"));
    }
}
