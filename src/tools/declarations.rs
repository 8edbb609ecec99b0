use crate::live::messages::{FunctionDeclaration, Schema};

/// The operations the remote model may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SaveAadhar,
    SavePan,
    VerifyDetails,
    CreateDigilocker,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::SaveAadhar,
        ToolKind::SavePan,
        ToolKind::VerifyDetails,
        ToolKind::CreateDigilocker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::SaveAadhar => "saveAadhar",
            ToolKind::SavePan => "savePan",
            ToolKind::VerifyDetails => "verifyDetails",
            ToolKind::CreateDigilocker => "createDigilocker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn declaration(self) -> FunctionDeclaration {
        let (description, parameters) = match self {
            ToolKind::SaveAadhar => (
                "Save the user's Aadhar card details once all three fields are confirmed.",
                Schema::object(
                    vec![
                        ("fullName", Schema::string("Full name as printed on the Aadhar card")),
                        ("number", Schema::string("12-digit Aadhar number")),
                        ("dob", Schema::string("Date of birth in DD-MM-YYYY format")),
                    ],
                    &["fullName", "number", "dob"],
                ),
            ),
            ToolKind::SavePan => (
                "Save the user's PAN card details once all three fields are confirmed.",
                Schema::object(
                    vec![
                        ("fullName", Schema::string("Full name as printed on the PAN card")),
                        ("number", Schema::string("10-character PAN number")),
                        ("dob", Schema::string("Date of birth as printed on the PAN card")),
                    ],
                    &["fullName", "number", "dob"],
                ),
            ),
            ToolKind::VerifyDetails => (
                "Cross-verify the saved Aadhar and PAN details. Returns MATCH or MISMATCH.",
                Schema::object(
                    vec![("action", Schema::string("Verification action, e.g. \"verify\""))],
                    &["action"],
                ),
            ),
            ToolKind::CreateDigilocker => (
                "Create the DigiLocker account after a successful verification.",
                Schema::object(
                    vec![("pin", Schema::string("6-digit PIN chosen by the user"))],
                    &["pin"],
                ),
            ),
        };

        FunctionDeclaration {
            name: self.name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Declarations for every tool, in a stable order
pub fn function_declarations() -> Vec<FunctionDeclaration> {
    ToolKind::ALL.into_iter().map(ToolKind::declaration).collect()
}
