use std::sync::Arc;

use axum::http::HeaderName;

use crate::application::answers::AnswerService;
use crate::application::audit::AuditService;
use crate::application::completion::{CompletionRedirect, TemplateRedirect};
use crate::application::design::{
    ChoiceDesignService, FieldDesignService, FieldTypeCatalog, PageDesignService, ScaleService,
    SurveyAccess, SurveyDesignService,
};
use crate::application::duplication::DuplicationService;
use crate::application::flow::FlowService;
use crate::application::permissions::{CreatorPolicy, PermissionPolicy};
use crate::application::remap::RemapService;
use crate::application::repos::{
    AuditRepo, ChoicesRepo, ChoicesWriteRepo, FieldsRepo, FieldsWriteRepo, PagesRepo,
    PagesWriteRepo, ResultsRepo, ResultsWriteRepo, ScalesRepo, ScalesWriteRepo, SurveyCopyRepo,
    SurveysRepo, SurveysWriteRepo,
};
use crate::application::results::ResultsService;
use crate::infra::http::HealthCheck;
use crate::infra::uploads::UploadStorage;

#[derive(Clone)]
pub struct ApiState {
    pub surveys: Arc<SurveyDesignService>,
    pub pages: Arc<PageDesignService>,
    pub fields: Arc<FieldDesignService>,
    pub choices: Arc<ChoiceDesignService>,
    pub scales: Arc<ScaleService>,
    pub duplication: Arc<DuplicationService>,
    pub flow: Arc<FlowService>,
    pub answers: Arc<AnswerService>,
    pub remap: Arc<RemapService>,
    pub results: Arc<ResultsService>,
    pub upload_storage: Arc<UploadStorage>,
    pub health: Arc<dyn HealthCheck>,
    /// Header carrying the authenticated user name.
    pub user_header: HeaderName,
}

/// Runtime knobs the services need beyond their repositories.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub user_header: HeaderName,
    pub field_types: FieldTypeCatalog,
    pub completion: TemplateRedirect,
}

impl ApiState {
    /// Wire every service against one repository implementation.
    pub fn assemble<R>(
        repositories: Arc<R>,
        health: Arc<dyn HealthCheck>,
        upload_storage: Arc<UploadStorage>,
        options: ServiceOptions,
    ) -> Self
    where
        R: SurveysRepo
            + SurveysWriteRepo
            + PagesRepo
            + PagesWriteRepo
            + FieldsRepo
            + FieldsWriteRepo
            + ChoicesRepo
            + ChoicesWriteRepo
            + ScalesRepo
            + ScalesWriteRepo
            + ResultsRepo
            + ResultsWriteRepo
            + SurveyCopyRepo
            + AuditRepo
            + 'static,
    {
        let surveys_repo: Arc<dyn SurveysRepo> = repositories.clone();
        let surveys_write_repo: Arc<dyn SurveysWriteRepo> = repositories.clone();
        let pages_repo: Arc<dyn PagesRepo> = repositories.clone();
        let pages_write_repo: Arc<dyn PagesWriteRepo> = repositories.clone();
        let fields_repo: Arc<dyn FieldsRepo> = repositories.clone();
        let fields_write_repo: Arc<dyn FieldsWriteRepo> = repositories.clone();
        let choices_repo: Arc<dyn ChoicesRepo> = repositories.clone();
        let choices_write_repo: Arc<dyn ChoicesWriteRepo> = repositories.clone();
        let scales_repo: Arc<dyn ScalesRepo> = repositories.clone();
        let scales_write_repo: Arc<dyn ScalesWriteRepo> = repositories.clone();
        let results_repo: Arc<dyn ResultsRepo> = repositories.clone();
        let results_write_repo: Arc<dyn ResultsWriteRepo> = repositories.clone();
        let copy_repo: Arc<dyn SurveyCopyRepo> = repositories.clone();
        let audit_repo: Arc<dyn AuditRepo> = repositories;

        let policy: Arc<dyn PermissionPolicy> = Arc::new(CreatorPolicy);
        let completion: Arc<dyn CompletionRedirect> = Arc::new(options.completion);
        let audit = AuditService::new(audit_repo);
        let access = SurveyAccess::new(surveys_repo.clone(), policy.clone());

        let flow = FlowService::new(
            surveys_repo.clone(),
            pages_write_repo.clone(),
            results_repo.clone(),
            scales_repo.clone(),
            policy.clone(),
            completion,
        );

        Self {
            surveys: Arc::new(SurveyDesignService::new(
                surveys_repo.clone(),
                surveys_write_repo,
                access.clone(),
                audit.clone(),
            )),
            pages: Arc::new(PageDesignService::new(
                pages_repo.clone(),
                pages_write_repo,
                fields_repo.clone(),
                access.clone(),
                audit.clone(),
            )),
            fields: Arc::new(FieldDesignService::new(
                fields_repo.clone(),
                fields_write_repo.clone(),
                pages_repo,
                choices_repo.clone(),
                scales_repo.clone(),
                options.field_types,
                access.clone(),
                audit.clone(),
            )),
            choices: Arc::new(ChoiceDesignService::new(
                choices_repo,
                choices_write_repo,
                fields_repo.clone(),
                surveys_repo.clone(),
                access.clone(),
                audit.clone(),
            )),
            scales: Arc::new(ScaleService::new(
                scales_repo.clone(),
                scales_write_repo,
                access,
                audit.clone(),
            )),
            duplication: Arc::new(DuplicationService::new(
                surveys_repo.clone(),
                copy_repo,
                policy.clone(),
                audit.clone(),
            )),
            answers: Arc::new(AnswerService::new(
                flow.clone(),
                results_write_repo,
                scales_repo.clone(),
            )),
            flow: Arc::new(flow),
            remap: Arc::new(RemapService::new(
                surveys_repo.clone(),
                fields_repo,
                fields_write_repo,
                results_repo.clone(),
                policy.clone(),
                audit,
            )),
            results: Arc::new(ResultsService::new(
                surveys_repo,
                results_repo,
                scales_repo,
                policy,
            )),
            upload_storage,
            health,
            user_header: options.user_header,
        }
    }
}
