use std::fmt;

/// A fatal runtime error: the message plus one rendered line per
/// active call frame, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub message: String,
    pub calls: Vec<String>,
}

impl Trace {
    pub fn new(message: impl Into<String>) -> Trace {
        Trace {
            message: message.into(),
            calls: Vec::new(),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for call in &self.calls {
            write!(f, "\n{}", call)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_message_then_frames() {
        let mut trace = Trace::new("Operands must be numbers.");
        trace.calls.push("[./main:2:5] in inner()".to_string());
        trace.calls.push("[./main:5:1] in script".to_string());

        assert_eq!(
            trace.to_string(),
            "Operands must be numbers.\n[./main:2:5] in inner()\n[./main:5:1] in script"
        );
    }
}
