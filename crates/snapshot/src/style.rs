/// Declarations of an inline `style` attribute, last one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(text: &str) -> Self {
        let declarations = text
            .split(';')
            .filter_map(|decl| {
                let (property, value) = decl.split_once(':')?;
                let property = property.trim().to_ascii_lowercase();
                let value = value.trim().trim_end_matches("!important").trim();
                (!property.is_empty()).then(|| (property, value.to_string()))
            })
            .collect();
        Self { declarations }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    /// Numeric value of a `px` (or unitless) length.
    pub fn pixels(&self, property: &str) -> Option<f64> {
        self.get(property)?
            .trim_end_matches("px")
            .trim()
            .parse()
            .ok()
    }
}
