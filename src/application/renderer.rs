//! Source renderer for container data.
//!
//! A pure function of [`ContainerRenderData`] and the indentation setting.
//! Output is made of chunks, each followed by one blank line.

use crate::application::view::{ContainerRenderData, ServiceData};
use crate::config::Settings;

pub struct Renderer<'a> {
    data: &'a ContainerRenderData,
    indent: String,
}

impl<'a> Renderer<'a> {
    pub fn new(data: &'a ContainerRenderData, settings: &Settings) -> Self {
        Self {
            data,
            indent: " ".repeat(settings.indent),
        }
    }

    /// Render the container source, without a trailing newline.
    pub fn render(&self) -> String {
        let data = self.data;
        let public = data.access_level.keyword();
        let mut lines: Vec<String> = data
            .imports
            .iter()
            .map(|import| format!("import {import}"))
            .collect();
        lines.push(String::new());
        lines.push(format!(
            "{public}class {}: {} {{",
            data.name, data.protocol_name
        ));
        lines.push(String::new());

        let mut chunks: Vec<Vec<String>> = Vec::new();
        chunks.push(
            data.externals
                .iter()
                .map(|e| self.line(1, &format!("{public}let {}: {}", e.accessor, e.type_name)))
                .collect(),
        );
        chunks.push(
            data.services
                .iter()
                .filter_map(|s| {
                    s.cached_field.as_ref().map(|field| {
                        self.line(1, &format!("private var {field}: {}", s.cached_type_name()))
                    })
                })
                .collect(),
        );
        chunks.push(self.initializer());
        chunks.extend(data.services.iter().map(|s| self.accessor(s)));
        chunks.extend(data.bound_accessors.iter().map(|b| {
            vec![
                self.line(1, &format!("{public}var {}: {} {{", b.accessor, b.type_name)),
                self.line(2, &format!("return self.{}", b.target_accessor)),
                self.line(1, "}"),
            ]
        }));
        chunks.extend(data.services.iter().map(|s| {
            vec![
                self.line(1, &format!("private func {}() -> {} {{", s.maker, s.type_name)),
                self.line(2, &format!("return {}", s.invocation)),
                self.line(1, "}"),
            ]
        }));

        for chunk in chunks.into_iter().filter(|c| !c.is_empty()) {
            lines.extend(chunk);
            lines.push(String::new());
        }
        lines.push("}".to_string());
        lines.join("\n")
    }

    fn initializer(&self) -> Vec<String> {
        let public = self.data.access_level.keyword();
        let params = self
            .data
            .externals
            .iter()
            .map(|e| format!("{}: {}", e.accessor, e.type_name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut lines = vec![self.line(1, &format!("{public}init({params}) {{"))];
        lines.extend(
            self.data
                .externals
                .iter()
                .map(|e| self.line(2, &format!("self.{0} = {0}", e.accessor))),
        );
        lines.push(self.line(1, "}"));
        lines
    }

    fn accessor(&self, service: &ServiceData) -> Vec<String> {
        let public = self.data.access_level.keyword();
        let name = &service.accessor;
        let mut lines = vec![self.line(
            1,
            &format!("{public}var {name}: {} {{", service.type_name),
        )];
        if let Some(field) = &service.cached_field {
            lines.push(self.line(
                2,
                &format!("if let cached = self.{field} {{ return cached }}"),
            ));
            lines.push(self.line(2, &format!("let {name} = self.{}()", service.maker)));
            lines.push(self.line(2, &format!("self.{field} = {name}")));
        } else {
            lines.push(self.line(2, &format!("let {name} = self.{}()", service.maker)));
        }
        lines.push(self.line(2, &format!("return {name}")));
        lines.push(self.line(1, "}"));
        lines
    }

    fn line(&self, depth: usize, text: &str) -> String {
        format!("{}{}", self.indent.repeat(depth), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::view::{BoundAccessorData, ExternalData};
    use crate::config::AccessLevel;

    fn data() -> ContainerRenderData {
        ContainerRenderData {
            name: "AppContainer".into(),
            protocol_name: "AppContaining".into(),
            access_level: AccessLevel::Public,
            imports: vec!["Foundation".into()],
            externals: vec![ExternalData {
                accessor: "appExternals".into(),
                type_name: "AppExternals".into(),
            }],
            services: vec![ServiceData {
                accessor: "api".into(),
                maker: "makeApi".into(),
                cached_field: None,
                type_name: "Api".into(),
                invocation: "Api(token: self.appExternals.token)".into(),
            }],
            bound_accessors: vec![],
        }
    }

    #[test]
    fn given_externals_and_uncached_service_when_rendering_then_matches_layout() {
        let rendered = Renderer::new(&data(), &Settings::default()).render();

        let expected = [
            "import Foundation",
            "",
            "public class AppContainer: AppContaining {",
            "",
            "    public let appExternals: AppExternals",
            "",
            "    public init(appExternals: AppExternals) {",
            "        self.appExternals = appExternals",
            "    }",
            "",
            "    public var api: Api {",
            "        let api = self.makeApi()",
            "        return api",
            "    }",
            "",
            "    private func makeApi() -> Api {",
            "        return Api(token: self.appExternals.token)",
            "    }",
            "",
            "}",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn given_internal_access_and_two_space_indent_when_rendering_then_no_public_keyword() {
        let mut data = data();
        data.access_level = AccessLevel::Internal;
        data.bound_accessors.push(BoundAccessorData {
            accessor: "apiProtocol".into(),
            type_name: "ApiProtocol".into(),
            target_accessor: "api".into(),
        });
        let settings = Settings {
            indent: 2,
            ..Settings::default()
        };

        let rendered = Renderer::new(&data, &settings).render();

        assert!(rendered.contains("\nclass AppContainer: AppContaining {"));
        assert!(rendered.contains("\n  let appExternals: AppExternals\n"));
        assert!(rendered.contains("\n  var apiProtocol: ApiProtocol {\n    return self.api\n  }"));
        assert!(!rendered.contains("public"));
        assert!(!rendered.ends_with('\n'));
    }
}
