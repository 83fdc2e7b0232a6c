use std::fmt::Display;

pub enum Error {
    FileNotFound(String, std::io::Error),
    GetFileError(reqwest::Error),
    LoaderErrorJsonValu3(valu3::Error),
    LoaderErrorScript(serde_yaml::Error),
    InvalidDocument(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::FileNotFound(path, err) => write!(f, "File not found: {} ({:?})", path, err),
            Error::GetFileError(err) => write!(f, "Get file error: {:?}", err),
            Error::LoaderErrorJsonValu3(err) => write!(f, "Json Valu3 error: {:?}", err),
            Error::LoaderErrorScript(err) => write!(f, "Yaml error: {:?}", err),
            Error::InvalidDocument(err) => write!(f, "Invalid document: {}", err),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::FileNotFound(path, err) => write!(f, "File not found: {} ({})", path, err),
            Error::GetFileError(err) => write!(f, "Get file error: {}", err),
            Error::LoaderErrorJsonValu3(err) => write!(f, "Json error: {:?}", err),
            Error::LoaderErrorScript(err) => write!(f, "Yaml error: {}", err),
            Error::InvalidDocument(err) => write!(f, "Invalid document: {}", err),
        }
    }
}

impl std::error::Error for Error {}
