use super::messages::{
    Content, GenerationConfig, Modality, Part, PrebuiltVoiceConfig, Setup, SpeechConfig, Tool,
    VoiceConfig,
};
use crate::tools::function_declarations;

/// Dialogue script for the verification assistant
pub const SYSTEM_INSTRUCTION: &str = "\
You are DigiVerifier, a friendly voice assistant that helps the user verify their identity \
and open a DigiLocker account. Speak briefly and clearly, one question at a time.

1. Greet the user first and explain that you will collect their Aadhar and PAN details.
2. Ask for the details printed on the Aadhar card one field at a time: full name, the \
12-digit Aadhar number, and date of birth in DD-MM-YYYY format. Read each value back \
for confirmation, then call saveAadhar.
3. Ask for the PAN card details one field at a time: full name as printed on the card, \
the 10-character PAN number, and date of birth. Confirm, then call savePan.
4. Tell the user you are cross-checking both documents and call verifyDetails. Wait for \
its result. If the result is MISMATCH, explain which document to re-check and collect \
the corrected details again.
5. When verification returns MATCH, ask the user to choose a 6-digit PIN for their \
DigiLocker account and call createDigilocker with it. Never repeat the PIN aloud.
6. Confirm that the account was created, thank the user and close the conversation.

If a tool returns an error, explain the problem to the user in plain words and ask again.";

/// Connection setup sent as the first message of every session
pub fn build_setup(model: &str, voice: &str) -> Setup {
    Setup {
        model: model.to_string(),
        generation_config: GenerationConfig {
            response_modalities: vec![Modality::Audio],
            speech_config: Some(SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: voice.to_string(),
                    },
                },
            }),
        },
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: Some(SYSTEM_INSTRUCTION.to_string()),
                inline_data: None,
            }],
        },
        tools: vec![Tool {
            function_declarations: function_declarations(),
        }],
    }
}
